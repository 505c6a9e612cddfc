//! Link database protocol.
//!
//! The modem keeps its all-link table internally and only offers paged reads
//! (`0x69` get first, `0x6A` get next, each answered by a `0x57` record
//! response) and a manage primitive (`0x6F`) that adds, modifies or deletes
//! the *first* record matching a key. Removing a specific record therefore
//! means deleting every record with its (group, address) key and adding back
//! the ones that should have stayed.
//!
//! Every mutation is a read-modify-write of the live table, so a batch that
//! failed halfway can simply be run again.

mod request;

pub use request::{ManageRecordRequest, RecordCommand};

use crate::error::{ModemError, Result};
use crate::modem::Modem;
use crate::protocol::{Command, LinkRecord, Packet};

/// What to add back after deleting every record that shares a target's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Restore {
    /// Every matched record that is not the target itself.
    Supplanted,
    /// One copy of each distinct matched record, the target included.
    OnePerLink,
}

/// The modem's link database.
#[derive(Debug, Clone)]
pub struct LinkDb {
    modem: Modem,
}

impl LinkDb {
    pub fn new(modem: Modem) -> Self {
        Self { modem }
    }

    /// Read the whole table.
    ///
    /// An empty table is answered by a nak to the first request and yields an
    /// empty list. A missing record response fails with `ReadTimeout` and the
    /// partial table is discarded.
    pub async fn links(&self) -> Result<Vec<LinkRecord>> {
        let record_timeout = self.modem.settings().record_timeout;
        let mut responses = self.modem.subscribe(Command::AllLinkRecordResponse)?;
        let mut links = Vec::new();

        tracing::debug!("Retrieving modem link database");
        let reply = self
            .modem
            .send(Packet::request(Command::GetFirstAllLink))
            .await?;
        if reply.is_nak() {
            tracing::debug!("Modem link database is empty");
            return Ok(links);
        }

        loop {
            let packet = responses.recv_timeout(record_timeout).await?;
            let link = packet
                .link_record()
                .copied()
                .ok_or(ModemError::UnexpectedPayload(Command::AllLinkRecordResponse))?;
            tracing::debug!("Received modem record response {}", link);
            links.push(link);

            let reply = self
                .modem
                .send(Packet::request(Command::GetNextAllLink))
                .await?;
            if reply.is_nak() {
                break;
            }
        }

        tracing::debug!("Retrieved {} link records", links.len());
        Ok(links)
    }

    /// Add `link`, or update the record with the same group, address and
    /// direction.
    pub async fn add_link(&self, link: &LinkRecord) -> Result<()> {
        let request = ManageRecordRequest::add(*link);
        tracing::debug!("Adding link {}", request);
        let reply = self.modem.send(request.into_packet()).await?;
        if reply.is_nak() {
            return Err(ModemError::LinkAddFailed);
        }
        Ok(())
    }

    /// Remove every copy of each record in `links`.
    ///
    /// Other records sharing a target's group and address are deleted along
    /// with it and added back afterwards. The batch stops at the first error,
    /// but whatever was collected for restoring is still added back.
    ///
    /// Records are added back with modify-first, which overwrites a record of
    /// the same group, address and direction. Several such siblings of a
    /// target therefore come back as a single record carrying the data of the
    /// last one restored.
    pub async fn remove_links(&self, links: &[LinkRecord]) -> Result<()> {
        self.remove(links, Restore::Supplanted).await
    }

    /// Collapse content-equal duplicates so that one copy of each remains.
    pub async fn cleanup(&self) -> Result<()> {
        let links = self.links().await?;

        let mut duplicated: Vec<LinkRecord> = Vec::new();
        for (i, link) in links.iter().enumerate() {
            let repeated = links[i + 1..].iter().any(|other| other.same_link(link));
            if repeated && !duplicated.iter().any(|seen| seen.same_link(link)) {
                duplicated.push(*link);
            }
        }

        if duplicated.is_empty() {
            tracing::debug!("No duplicate links found");
            return Ok(());
        }
        tracing::debug!("Found {} duplicated links", duplicated.len());
        self.remove(&duplicated, Restore::OnePerLink).await
    }

    async fn remove(&self, targets: &[LinkRecord], mode: Restore) -> Result<()> {
        let mut restore = Vec::new();
        let mut result = Ok(());

        for target in targets {
            if let Err(e) = self.remove_one(target, mode, &mut restore).await {
                tracing::info!("Failed to remove link {}: {}", target, e);
                result = Err(e);
                break;
            }
        }

        if mode == Restore::Supplanted {
            // A later target may have been collected while removing an
            // earlier one with the same key.
            restore.retain(|link| !targets.iter().any(|target| target.same_link(link)));
        }

        for link in &restore {
            if let Err(e) = self.add_link(link).await {
                tracing::info!("Failed to restore link {}: {}", link, e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        result
    }

    /// Delete every record keyed like `target`, collecting into `restore`
    /// the ones that should come back.
    async fn remove_one(
        &self,
        target: &LinkRecord,
        mode: Restore,
        restore: &mut Vec<LinkRecord>,
    ) -> Result<()> {
        let links = self.links().await?;

        let mut matched = 0;
        for link in links.iter().filter(|link| link.matches_key(target)) {
            matched += 1;
            let keep = match mode {
                Restore::Supplanted => !link.same_link(target),
                Restore::OnePerLink => !restore.iter().any(|kept| kept.same_link(link)),
            };
            if keep {
                restore.push(*link);
            }
        }

        tracing::debug!("Deleting {} records keyed like {}", matched, target);
        let request = ManageRecordRequest::delete(*target);
        for _ in 0..matched {
            let reply = self.modem.send(request.into_packet()).await?;
            if reply.is_nak() {
                tracing::info!("Modem refused to delete a record keyed like {}", target);
                return Err(ModemError::LinkRemoveFailed);
            }
        }

        Ok(())
    }
}
