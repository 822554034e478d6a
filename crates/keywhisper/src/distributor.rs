// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key distributor: pairs unconsumed recipients with unconsumed codes and
//! delivers one code per private message, strictly one at a time.
//!
//! Both records of a pair are marked consumed (and the files rewritten)
//! before the pacing delay starts, so at most one message can be in flight
//! without being recorded at any crash point. Re-running after a failure
//! skips everything already marked.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::chat::Whisperer;
use crate::error::Error;
use crate::record::{MessageRecord, RecordStore};

/// Placeholder in the message template replaced by the delivered code.
pub const CODE_PLACEHOLDER: &str = "<STEAM_KEY>";

/// Default delay between two deliveries.
pub const DEFAULT_PACE: Duration = Duration::from_secs(20);

/// How many records of each file are echoed to the log after loading.
const PREVIEW_LEN: usize = 5;

/// Inputs of a distribution run.
#[derive(Debug, Clone)]
pub struct DistributorConfig {
    pub recipients_path: PathBuf,
    pub codes_path: PathBuf,
    /// Message text; [`CODE_PLACEHOLDER`] is replaced by the code.
    pub template: String,
    /// Delay imposed after each delivery before the next one.
    pub pace: Duration,
}

/// The i-th unconsumed recipient paired with the i-th unconsumed code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub recipient: MessageRecord,
    pub code: MessageRecord,
    recipient_index: usize,
    code_index: usize,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub delivered: usize,
}

/// Read-only counts for operator queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub recipients_total: usize,
    pub recipients_consumed: usize,
    pub codes_total: usize,
    pub codes_consumed: usize,
}

impl StatusReport {
    pub fn recipients_remaining(&self) -> usize {
        self.recipients_total - self.recipients_consumed
    }

    pub fn codes_remaining(&self) -> usize {
        self.codes_total - self.codes_consumed
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "recipients: {}/{} served, {} waiting; codes: {}/{} used, {} left",
            self.recipients_consumed,
            self.recipients_total,
            self.recipients_remaining(),
            self.codes_consumed,
            self.codes_total,
            self.codes_remaining(),
        )
    }
}

struct Stores {
    recipients: RecordStore,
    codes: RecordStore,
}

impl Stores {
    fn pairings(&self) -> Result<Vec<Pairing>, Error> {
        let recipients = self.recipients.unconsumed();
        let codes = self.codes.unconsumed();
        if codes.len() < recipients.len() {
            return Err(Error::InsufficientSupply { have: codes.len(), need: recipients.len() });
        }

        let mut pairs = Vec::with_capacity(recipients.len());
        for (&ri, &ci) in recipients.iter().zip(codes.iter()) {
            let (Some(recipient), Some(code)) = (self.recipients.get(ri), self.codes.get(ci))
            else {
                continue;
            };
            pairs.push(Pairing {
                recipient: recipient.clone(),
                code: code.clone(),
                recipient_index: ri,
                code_index: ci,
            });
        }
        Ok(pairs)
    }
}

/// Drives a distribution run over two record files.
pub struct KeyDistributor {
    stores: Mutex<Stores>,
    template: String,
    pace: Duration,
    whisperer: Arc<dyn Whisperer>,
    running: AtomicBool,
}

impl KeyDistributor {
    /// Load both record files and check that every unconsumed recipient can
    /// get a code. Nothing is delivered if this fails.
    pub fn prepare(config: DistributorConfig, whisperer: Arc<dyn Whisperer>) -> Result<Self, Error> {
        let codes = RecordStore::load(&config.codes_path)?;
        let recipients = RecordStore::load(&config.recipients_path)?;

        if codes.consumed_count() > 0 {
            info!(
                used = codes.consumed_count(),
                "some codes have already been used, they are omitted from the pool"
            );
        }
        if recipients.consumed_count() > 0 {
            info!(
                served = recipients.consumed_count(),
                "some recipients already got a code, they are omitted from the pool"
            );
        }

        let stores = Stores { recipients, codes };
        let pairs = stores.pairings()?;

        let preview_recipients: Vec<&str> =
            pairs.iter().take(PREVIEW_LEN).map(|p| p.recipient.value()).collect();
        let preview_codes: Vec<&str> = stores
            .codes
            .unconsumed()
            .into_iter()
            .take(PREVIEW_LEN)
            .filter_map(|i| stores.codes.get(i).map(MessageRecord::value))
            .collect();
        info!(
            pairs = pairs.len(),
            recipients = ?preview_recipients,
            codes = ?preview_codes,
            "records loaded, first entries shown"
        );

        Ok(Self {
            stores: Mutex::new(stores),
            template: config.template,
            pace: config.pace,
            whisperer,
            running: AtomicBool::new(false),
        })
    }

    /// The pairs the next run would deliver, in order.
    pub fn pairings(&self) -> Result<Vec<Pairing>, Error> {
        self.stores.lock().pairings()
    }

    /// Deliver every pending pair, pausing [`DistributorConfig::pace`] between sends.
    ///
    /// Stops at the first transport failure; that pair stays unconsumed.
    pub async fn run(&self) -> Result<RunSummary, Error> {
        let _guard = RunGuard::acquire(&self.running)?;

        let pairs = self.pairings()?;
        let total = pairs.len();
        info!(pairs = total, pace_ms = self.pace.as_millis() as u64, "distribution run started");

        let mut delivered = 0;
        for (i, pair) in pairs.iter().enumerate() {
            let recipient = pair.recipient.value();
            let text = render_message(&self.template, pair.code.value());

            if let Err(source) = self.whisperer.whisper(recipient, &text).await {
                warn!(
                    recipient,
                    line = pair.recipient.line(),
                    delivered,
                    err = %source,
                    "delivery failed, stopping run"
                );
                return Err(Error::DeliveryFailed {
                    recipient: recipient.to_owned(),
                    line: pair.recipient.line(),
                    source,
                });
            }

            {
                let mut stores = self.stores.lock();
                // Code first: a failed rewrite may waste a code, never reissue one.
                stores.codes.mark_consumed(pair.code_index)?;
                stores.recipients.mark_consumed(pair.recipient_index)?;
            }
            delivered += 1;
            info!(recipient, progress = %format!("{delivered}/{total}"), "code delivered");

            if i + 1 < total {
                tokio::time::sleep(self.pace).await;
            }
        }

        info!(delivered, "distribution run finished");
        Ok(RunSummary { delivered })
    }

    pub fn status_report(&self) -> StatusReport {
        let stores = self.stores.lock();
        StatusReport {
            recipients_total: stores.recipients.len(),
            recipients_consumed: stores.recipients.consumed_count(),
            codes_total: stores.codes.len(),
            codes_consumed: stores.codes.consumed_count(),
        }
    }
}

/// Substitute the code into the first placeholder of `template`.
pub fn render_message(template: &str, code: &str) -> String {
    template.replacen(CODE_PLACEHOLDER, code, 1)
}

/// Clears the running flag when the run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, Error> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::AlreadyRunning)?;
        Ok(Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[path = "distributor_tests.rs"]
mod tests;
