//! The market service: one task owns the market and its store.
//!
//! Callers hold a cheap, cloneable [`MarketHandle`]. Each call sends a
//! [`Command`] over a bounded queue and waits on a oneshot reply. The task
//! runs commands one at a time and each runs to completion, so a caller that
//! gives up while waiting can never leave a half-applied change behind.
//!
//! Successful state changes are journaled before the reply is sent. If the
//! journal cannot be written the service halts: memory is ahead of disk, so
//! every later command is refused with `ServiceHalted`.

use ogle_matchcore::BookSnapshot;
use ogle_types::{MarketConfig, OgleError, OrderSide, Result, TokenBalances};
use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::journal::JournalRecord;
use crate::market::{Applied, Change, Market, Placement, Registration};
use crate::recovery::{self, Recovered};
use crate::store::MarketStore;

type Reply<T> = oneshot::Sender<Result<T>>;

/// Requests understood by the market task.
#[derive(Debug)]
pub enum Command {
    Register {
        account: String,
        reply: Reply<Registration>,
    },
    Balances {
        account: String,
        reply: Reply<TokenBalances>,
    },
    Credit {
        account: String,
        token: String,
        amount: Decimal,
        reply: Reply<TokenBalances>,
    },
    MintBase {
        account: String,
        amount: Decimal,
        reply: Reply<TokenBalances>,
    },
    PlaceOrder {
        account: String,
        side: String,
        price: Decimal,
        quantity: Decimal,
        reply: Reply<Placement>,
    },
    OrderBook {
        reply: Reply<BookSnapshot>,
    },
    VerifySupply {
        reply: Reply<()>,
    },
    /// Snapshot now, compact the journal, export the documents.
    Checkpoint {
        reply: Reply<u64>,
    },
}

/// Owner of the market state. Runs inside its own tokio task.
pub struct MarketService<S: MarketStore> {
    market: Market,
    store: S,
    commands: mpsc::Receiver<Command>,
    last_sequence: u64,
    since_snapshot: u64,
    snapshot_interval: u64,
    halted: Option<String>,
}

impl<S: MarketStore> MarketService<S> {
    /// Recover from `store` and spawn the service task.
    ///
    /// Must be called from within a tokio runtime. The task ends once every
    /// handle is dropped, after writing a final checkpoint.
    ///
    /// # Errors
    /// `Configuration` for an invalid config, or any recovery error.
    pub fn spawn(config: &MarketConfig, mut store: S) -> Result<(MarketHandle, JoinHandle<()>)> {
        config.validate()?;
        let Recovered {
            market,
            last_sequence,
            replayed,
        } = recovery::recover(config, &mut store)?;

        let (tx, rx) = mpsc::channel(config.command_buffer);
        let service = Self {
            market,
            store,
            commands: rx,
            last_sequence,
            since_snapshot: u64::try_from(replayed).unwrap_or(u64::MAX),
            snapshot_interval: config.snapshot_interval,
            halted: None,
        };
        let task = tokio::spawn(service.run());
        Ok((MarketHandle { tx }, task))
    }

    async fn run(mut self) {
        tracing::info!(
            pair = %self.market.pair(),
            last_sequence = self.last_sequence,
            "Market service started"
        );

        while let Some(command) = self.commands.recv().await {
            self.handle(command);
        }

        if self.halted.is_none() {
            if let Err(err) = self.checkpoint() {
                tracing::error!(error = %err, "Final checkpoint failed");
            }
        }
        tracing::info!(last_sequence = self.last_sequence, "Market service stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Register { account, reply } => {
                let result = self
                    .commit(Change::register(&account))
                    .and_then(|applied| match applied {
                        Applied::Registered(registration) => Ok(registration),
                        other => Err(mismatch(&other)),
                    });
                let _ = reply.send(result);
            }
            Command::Balances { account, reply } => {
                let result = self.guard().and_then(|()| self.market.balances(&account));
                let _ = reply.send(result);
            }
            Command::Credit {
                account,
                token,
                amount,
                reply,
            } => {
                let _ = reply.send(self.credit(Change::credit(&account, &token, amount)));
            }
            Command::MintBase {
                account,
                amount,
                reply,
            } => {
                let base = self.market.pair().base.clone();
                let _ = reply.send(self.credit(Change::credit(&account, &base, amount)));
            }
            Command::PlaceOrder {
                account,
                side,
                price,
                quantity,
                reply,
            } => {
                let change = side
                    .parse::<OrderSide>()
                    .and_then(|side| Change::place_order(&account, side, price, quantity));
                let result = self.commit(change).and_then(|applied| match applied {
                    Applied::Placed(placement) => Ok(placement),
                    other => Err(mismatch(&other)),
                });
                let _ = reply.send(result);
            }
            Command::OrderBook { reply } => {
                let result = self.guard().map(|()| self.market.orderbook_snapshot());
                let _ = reply.send(result);
            }
            Command::VerifySupply { reply } => {
                let result = self.guard().and_then(|()| self.market.verify_supply());
                let _ = reply.send(result);
            }
            Command::Checkpoint { reply } => {
                let result = self.guard().and_then(|()| self.checkpoint());
                let _ = reply.send(result);
            }
        }
    }

    fn guard(&self) -> Result<()> {
        match &self.halted {
            Some(reason) => Err(OgleError::ServiceHalted {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn credit(&mut self, change: Result<Change>) -> Result<TokenBalances> {
        self.commit(change).and_then(|applied| match applied {
            Applied::Credited(balances) => Ok(balances),
            other => Err(mismatch(&other)),
        })
    }

    /// Apply a change, then journal it. The journal write is what makes the
    /// change durable; the caller hears back only after it.
    fn commit(&mut self, change: Result<Change>) -> Result<Applied> {
        self.guard()?;
        let change = change?;
        let applied = self.market.apply(&change)?;
        if !applied.changed_state() {
            return Ok(applied);
        }

        let sequence = self.last_sequence + 1;
        let appended = JournalRecord::seal(sequence, change)
            .and_then(|record| self.store.append(&record));
        if let Err(err) = appended {
            let reason = format!("journal append of sequence {sequence} failed: {err}");
            tracing::error!(sequence, error = %err, "Journal append failed; halting market service");
            self.halted = Some(reason.clone());
            return Err(OgleError::ServiceHalted { reason });
        }
        self.last_sequence = sequence;
        self.since_snapshot += 1;

        if self.snapshot_interval > 0 && self.since_snapshot >= self.snapshot_interval {
            if let Err(err) = self.checkpoint() {
                // Journal still holds every change; retried on the next commit.
                tracing::warn!(error = %err, "Periodic snapshot failed");
            }
        }
        Ok(applied)
    }

    fn checkpoint(&mut self) -> Result<u64> {
        let state = self.market.to_state(self.last_sequence);
        self.store.save_snapshot(&state)?;
        self.store.compact_journal(self.last_sequence)?;
        self.store.export_documents(&self.market.documents())?;
        self.since_snapshot = 0;
        tracing::info!(sequence = self.last_sequence, "Snapshot written");
        Ok(self.last_sequence)
    }
}

fn mismatch(applied: &Applied) -> OgleError {
    OgleError::Internal(format!("unexpected change result: {applied:?}"))
}

/// Cloneable client of the market service.
#[derive(Debug, Clone)]
pub struct MarketHandle {
    tx: mpsc::Sender<Command>,
}

impl MarketHandle {
    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| OgleError::ServiceUnavailable)?;
        rx.await.map_err(|_| OgleError::ServiceUnavailable)?
    }

    pub async fn register(&self, account: impl Into<String>) -> Result<Registration> {
        let account = account.into();
        self.request(|reply| Command::Register { account, reply }).await
    }

    pub async fn balances(&self, account: impl Into<String>) -> Result<TokenBalances> {
        let account = account.into();
        self.request(|reply| Command::Balances { account, reply }).await
    }

    pub async fn credit(
        &self,
        account: impl Into<String>,
        token: impl Into<String>,
        amount: Decimal,
    ) -> Result<TokenBalances> {
        let (account, token) = (account.into(), token.into());
        self.request(|reply| Command::Credit {
            account,
            token,
            amount,
            reply,
        })
        .await
    }

    pub async fn mint_base(&self, account: impl Into<String>, amount: Decimal) -> Result<TokenBalances> {
        let account = account.into();
        self.request(|reply| Command::MintBase {
            account,
            amount,
            reply,
        })
        .await
    }

    /// Place a limit order; `side` is `"buy"` or `"sell"`.
    pub async fn place_order(
        &self,
        account: impl Into<String>,
        side: impl Into<String>,
        price: Decimal,
        quantity: Decimal,
    ) -> Result<Placement> {
        let (account, side) = (account.into(), side.into());
        self.request(|reply| Command::PlaceOrder {
            account,
            side,
            price,
            quantity,
            reply,
        })
        .await
    }

    pub async fn orderbook_snapshot(&self) -> Result<BookSnapshot> {
        self.request(|reply| Command::OrderBook { reply }).await
    }

    pub async fn verify_supply(&self) -> Result<()> {
        self.request(|reply| Command::VerifySupply { reply }).await
    }

    /// Force a snapshot. Returns the journal sequence it covers.
    pub async fn checkpoint(&self) -> Result<u64> {
        self.request(|reply| Command::Checkpoint { reply }).await
    }
}
