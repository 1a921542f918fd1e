use crate::consensus_meta::persistent_state::{
    LastKnownLeader, PersistedRecord, PreviousVote, MIN_TERM,
};
use crate::consensus_meta::removed_peers::RemovedPeers;
use crate::fault;
use crate::fs::{read_record, write_record, FsManager, RecordError, SyncMode, WriteMode};
use crate::options::{CMetaOptions, CMetaOptionsValidated};
use crate::quorum::{
    compute_role, count_voters, is_member, is_voter, member_detail, verify_config, ConsensusRole,
    HostPort, InvalidConfig, MemberDetail, RaftConfig, RaftPeer,
};
use std::collections::BTreeMap;
use std::convert::TryFrom;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

const SLOW_FLUSH_WARN_THRESHOLD: Duration = Duration::from_millis(500);

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CreateMode {
    /// Write the record to disk as part of creation. Creation must not
    /// clobber an existing record.
    FlushOnCreate,
    /// Construct in memory only; fail if a record file already exists.
    NoFlushOnCreate,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FlushMode {
    Overwrite,
    NoOverwrite,
}

/// Selects which configuration a query runs against.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConfigKind {
    /// Pending if a config change is in flight, committed otherwise.
    Active,
    Committed,
    Pending,
}

#[derive(Debug, thiserror::Error)]
pub enum CMetaError {
    #[error("consensus metadata already present at {0}")]
    AlreadyPresent(String),
    #[error("consensus metadata not found")]
    NotFound,
    #[error("invalid config in consensus metadata, cannot flush to disk: {0}")]
    InvalidConfig(#[from] InvalidConfig),
    #[error("consensus metadata is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    IllegalOptions(#[from] crate::options::InvalidOptions),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Snapshot of the externally visible consensus state.
#[derive(Debug, Clone)]
pub struct ConsensusState {
    pub current_term: i64,
    pub leader_uuid: Option<String>,
    pub committed_config: RaftConfig,
    pub pending_config: Option<RaftConfig>,
}

/// Durable record of a replication group's raft voting state and membership,
/// plus the volatile overlay (pending config, observed leader, derived role)
/// that is rebuilt after a restart.
///
/// Mutators require `&mut self`; a caller that shares an instance across
/// threads wraps it in its own lock. All disk I/O is confined to `create`,
/// `load`, `flush`, `sync_last_known_leader` and `delete_on_disk`; every
/// other operation is memory-only.
#[derive(Debug)]
pub struct ConsensusMetadata {
    logger: slog::Logger,
    fs_manager: Arc<FsManager>,
    group_id: String,
    peer_uuid: String,
    options: CMetaOptionsValidated,

    record: PersistedRecord,

    // Volatile state, rebuilt on load.
    pending_config: Option<RaftConfig>,
    leader_uuid: String,
    active_role: ConsensusRole,
    removed_peers: RemovedPeers,
    on_disk_size: u64,
    flush_count: u64,
}

impl ConsensusMetadata {
    fn new_unflushed(
        logger: slog::Logger,
        fs_manager: Arc<FsManager>,
        group_id: String,
        peer_uuid: String,
        options: CMetaOptionsValidated,
        record: PersistedRecord,
    ) -> Self {
        let logger = logger.new(slog::o!(
            "group" => group_id.clone(),
            "peer" => peer_uuid.clone(),
        ));
        let max_removed_peers = options.max_removed_peers;

        ConsensusMetadata {
            logger,
            fs_manager,
            group_id,
            peer_uuid,
            options,
            record,
            pending_config: None,
            leader_uuid: String::new(),
            active_role: ConsensusRole::NonParticipant,
            removed_peers: RemovedPeers::with_capacity(max_removed_peers),
            on_disk_size: 0,
            flush_count: 0,
        }
    }

    /// Constructs metadata for a new replication group with the given
    /// committed config and term. `FlushOnCreate` persists immediately and
    /// refuses to clobber an existing record; `NoFlushOnCreate` only verifies
    /// no record file is already on disk.
    pub fn create(
        logger: slog::Logger,
        fs_manager: Arc<FsManager>,
        group_id: impl Into<String>,
        peer_uuid: impl Into<String>,
        config: RaftConfig,
        current_term: i64,
        create_mode: CreateMode,
        options: CMetaOptions,
    ) -> Result<Self, CMetaError> {
        let options = CMetaOptionsValidated::try_from(options)?;
        let mut cmeta = Self::new_unflushed(
            logger,
            fs_manager,
            group_id.into(),
            peer_uuid.into(),
            options,
            PersistedRecord::new(),
        );
        cmeta.set_committed_config(config);
        cmeta.set_current_term(current_term);

        match create_mode {
            CreateMode::FlushOnCreate => cmeta.flush(FlushMode::NoOverwrite)?,
            CreateMode::NoFlushOnCreate => {
                let path = cmeta.fs_manager.meta_path(&cmeta.group_id);
                if cmeta.fs_manager.env().file_exists(&path) {
                    return Err(CMetaError::AlreadyPresent(path.display().to_string()));
                }
            }
        }
        Ok(cmeta)
    }

    /// Loads the persisted record for an existing replication group.
    pub fn load(
        logger: slog::Logger,
        fs_manager: Arc<FsManager>,
        group_id: impl Into<String>,
        peer_uuid: impl Into<String>,
        options: CMetaOptions,
    ) -> Result<Self, CMetaError> {
        let options = CMetaOptionsValidated::try_from(options)?;
        let group_id = group_id.into();

        let path = fs_manager.meta_path(&group_id);
        let record: PersistedRecord =
            read_record(fs_manager.env(), &path).map_err(record_error_to_cmeta)?;

        let mut cmeta = Self::new_unflushed(
            logger,
            fs_manager,
            group_id,
            peer_uuid.into(),
            options,
            record,
        );
        cmeta.update_active_role();
        cmeta.update_on_disk_size()?;
        Ok(cmeta)
    }

    /// Removes the on-disk record for a group. The in-memory instance, if
    /// any, is unaffected.
    pub fn delete_on_disk(fs_manager: &FsManager, group_id: &str) -> Result<(), CMetaError> {
        let path = fs_manager.meta_path(group_id);
        fs_manager.env().delete_file(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                CMetaError::NotFound
            } else {
                CMetaError::Io(e)
            }
        })
    }

    /// Persists the current record with fsync. The committed config is
    /// verified first; an invalid config never reaches disk.
    pub fn flush(&mut self, flush_mode: FlushMode) -> Result<(), CMetaError> {
        fault::maybe_crash(self.options.fault_crash_before_flush);
        let flush_started = Instant::now();
        self.flush_count += 1;

        verify_config(self.committed_config())?;

        let dir = self.fs_manager.meta_dir();
        let env = self.fs_manager.env();
        let created_dir = env.create_dir_if_missing(&dir)?;
        if created_dir {
            if let Some(parent) = dir.parent() {
                env.sync_dir(parent)?;
            }
        }

        let path = self.fs_manager.meta_path(&self.group_id);
        let write_mode = match flush_mode {
            FlushMode::Overwrite => WriteMode::Overwrite,
            FlushMode::NoOverwrite => WriteMode::NoOverwrite,
        };
        write_record(env, &path, &self.record, write_mode, SyncMode::Sync).map_err(|e| {
            match e {
                RecordError::AlreadyExists => {
                    CMetaError::AlreadyPresent(path.display().to_string())
                }
                other => record_error_to_cmeta(other),
            }
        })?;

        self.update_on_disk_size()?;

        let elapsed = flush_started.elapsed();
        if elapsed > SLOW_FLUSH_WARN_THRESHOLD {
            slog::warn!(
                self.logger,
                "slow consensus metadata flush took {:?}",
                elapsed
            );
        }
        Ok(())
    }

    // ---- term and vote ----

    pub fn current_term(&self) -> i64 {
        self.record.current_term
    }

    pub fn set_current_term(&mut self, term: i64) {
        debug_assert!(term >= MIN_TERM, "term {} below minimum", term);
        debug_assert!(
            term >= self.record.current_term,
            "current term cannot decrease: {} -> {}",
            self.record.current_term,
            term
        );
        self.record.current_term = term;
    }

    pub fn has_voted_for(&self) -> bool {
        self.record.voted_for.is_some()
    }

    pub fn voted_for(&self) -> Option<&str> {
        self.record.voted_for.as_deref()
    }

    pub fn clear_voted_for(&mut self) {
        self.record.voted_for = None;
    }

    /// Records a vote granted in the current term and folds it into the
    /// pruned vote history.
    pub fn set_voted_for(&mut self, uuid: impl Into<String>) {
        let uuid = uuid.into();
        debug_assert!(!uuid.is_empty(), "cannot vote for an empty uuid");
        self.record.voted_for = Some(uuid.clone());

        let vote = PreviousVote {
            candidate_uuid: uuid,
            election_term: self.record.current_term,
        };
        self.populate_previous_vote_history(vote);
    }

    fn populate_previous_vote_history(&mut self, vote: PreviousVote) {
        let last_known_leader_term = self.record.last_known_leader.election_term;

        self.record
            .previous_vote_history
            .entry(vote.election_term)
            .or_insert(vote);

        // Step 1: prune everything at or below the last known leader's term.
        let pruned_terms: Vec<i64> = self
            .record
            .previous_vote_history
            .range(..=last_known_leader_term)
            .map(|(term, _)| *term)
            .collect();
        if let Some(&highest_pruned) = pruned_terms.last() {
            for term in &pruned_terms {
                self.record.previous_vote_history.remove(term);
            }
            self.record.last_pruned_term = highest_pruned;
            slog::debug!(
                self.logger,
                "pruned vote history through term {}",
                highest_pruned
            );
        }

        // Step 2: still over capacity, evict the oldest entry.
        if self.record.previous_vote_history.len() > self.options.vote_history_max_size {
            let oldest_term = *self
                .record
                .previous_vote_history
                .keys()
                .next()
                .expect("history cannot be empty while over capacity");
            self.record.previous_vote_history.remove(&oldest_term);
            self.record.last_pruned_term = oldest_term;
            slog::debug!(
                self.logger,
                "pruned vote history through term {}",
                oldest_term
            );
        }
    }

    pub fn previous_vote_history(&self) -> BTreeMap<i64, PreviousVote> {
        self.record.previous_vote_history.clone()
    }

    pub fn last_pruned_term(&self) -> i64 {
        self.record.last_pruned_term
    }

    // ---- configs ----

    pub fn committed_config(&self) -> &RaftConfig {
        self.record
            .committed_config
            .as_ref()
            .expect("committed config not initialized")
    }

    pub fn set_committed_config(&mut self, config: RaftConfig) {
        self.record.committed_config = Some(config);
        if self.pending_config.is_none() {
            self.update_active_role();
        }
    }

    pub fn has_pending_config(&self) -> bool {
        self.pending_config.is_some()
    }

    pub fn pending_config(&self) -> Option<&RaftConfig> {
        self.pending_config.as_ref()
    }

    pub fn set_pending_config(&mut self, config: RaftConfig) {
        self.pending_config = Some(config);
        self.update_active_role();
    }

    pub fn clear_pending_config(&mut self) {
        self.pending_config = None;
        self.update_active_role();
    }

    /// The pending config if a change is in flight, the committed config
    /// otherwise.
    pub fn active_config(&self) -> &RaftConfig {
        self.pending_config
            .as_ref()
            .unwrap_or_else(|| self.committed_config())
    }

    /// Replaces whichever config is currently active: the pending slot if a
    /// change is in flight, the committed slot otherwise.
    pub fn set_active_config(&mut self, config: RaftConfig) {
        if self.pending_config.is_some() {
            self.set_pending_config(config);
        } else {
            self.set_committed_config(config);
        }
    }

    pub fn config(&self, kind: ConfigKind) -> &RaftConfig {
        match kind {
            ConfigKind::Active => self.active_config(),
            ConfigKind::Committed => self.committed_config(),
            ConfigKind::Pending => self
                .pending_config
                .as_ref()
                .expect("there is no pending config"),
        }
    }

    pub fn is_voter_in_config(&self, uuid: &str, kind: ConfigKind) -> bool {
        is_voter(uuid, self.config(kind))
    }

    pub fn is_member_in_config(&self, uuid: &str, kind: ConfigKind) -> bool {
        is_member(uuid, self.config(kind))
    }

    pub fn count_voters_in_config(&self, kind: ConfigKind) -> usize {
        count_voters(self.config(kind))
    }

    pub fn config_opid_index(&self, kind: ConfigKind) -> i64 {
        self.config(kind).opid_index
    }

    pub fn member_detail(&self, uuid: &str) -> Option<MemberDetail> {
        member_detail(uuid, self.active_config())
    }

    pub fn config_member(&self, uuid: &str) -> Option<&RaftPeer> {
        self.active_config().peers.iter().find(|p| p.uuid == uuid)
    }

    /// Required voter count per quorum group, from the committed config.
    pub fn voter_distribution(&self) -> BTreeMap<String, i32> {
        self.committed_config().voter_distribution.clone()
    }

    // ---- leader ----

    pub fn leader_uuid(&self) -> &str {
        &self.leader_uuid
    }

    /// Records the observed leader for the current term and recomputes the
    /// active role. Memory-only; the leader becomes durable solely through
    /// `sync_last_known_leader`.
    pub fn set_leader_uuid(&mut self, uuid: impl Into<String>) {
        self.leader_uuid = uuid.into();
        self.update_active_role();
    }

    pub fn last_known_leader(&self) -> LastKnownLeader {
        self.record.last_known_leader.clone()
    }

    /// Persists the observed leader as the last known leader. A no-op when
    /// no leader is known, or when `cas_term` is given and no longer matches
    /// the current term (the caller's observation went stale).
    pub fn sync_last_known_leader(&mut self, cas_term: Option<i64>) -> Result<(), CMetaError> {
        if self.leader_uuid.is_empty() {
            return Ok(());
        }

        let current_term = self.record.current_term;
        if let Some(cas_term) = cas_term {
            if cas_term != current_term {
                slog::info!(
                    self.logger,
                    "last known leader CAS term mismatch: supplied {}, current {}; not updating",
                    cas_term,
                    current_term
                );
                return Ok(());
            }
        }

        slog::info!(
            self.logger,
            "last known leader updated to {} for term {}",
            self.leader_uuid,
            current_term
        );
        self.record.last_known_leader = LastKnownLeader {
            uuid: self.leader_uuid.clone(),
            election_term: current_term,
        };
        self.flush(FlushMode::Overwrite)
    }

    /// The active-config address of the current leader, if one is known and
    /// it advertised an address.
    pub fn leader_hostport(&self) -> Option<HostPort> {
        if self.leader_uuid.is_empty() {
            return None;
        }
        self.active_config()
            .peers
            .iter()
            .find(|p| p.uuid == self.leader_uuid)
            .and_then(|p| p.last_known_addr.clone())
    }

    // ---- role ----

    pub fn active_role(&self) -> ConsensusRole {
        self.active_role
    }

    fn update_active_role(&mut self) {
        let role = compute_role(&self.peer_uuid, &self.leader_uuid, self.active_config());
        self.active_role = role;
        slog::debug!(self.logger, "updated active role to {:?}", role);
    }

    // ---- removed peers ----

    /// Registers peers that were removed from the config. Peers still in the
    /// active config are skipped.
    pub fn insert_removed_peers(&mut self, removed: &[String]) {
        for uuid in removed {
            if !is_member(uuid, self.active_config()) {
                self.removed_peers.insert(uuid.clone());
            }
        }
    }

    /// Whether `uuid` was deliberately removed from this group. A peer in
    /// the active config is never considered removed, regardless of registry
    /// contents.
    pub fn is_peer_removed(&self, uuid: &str) -> bool {
        if is_member(uuid, self.active_config()) {
            return false;
        }
        self.removed_peers.contains(uuid)
    }

    pub fn delete_removed_peer(&mut self, uuid: &str) {
        self.removed_peers.remove(uuid);
    }

    pub fn delete_removed_peers(&mut self, uuids: &[String]) {
        for uuid in uuids {
            self.removed_peers.remove(uuid);
        }
    }

    pub fn clear_removed_peers(&mut self) {
        self.removed_peers.clear();
    }

    pub fn removed_peers(&self) -> Vec<String> {
        self.removed_peers.snapshot()
    }

    // ---- state exchange ----

    pub fn to_consensus_state(&self) -> ConsensusState {
        ConsensusState {
            current_term: self.record.current_term,
            leader_uuid: if self.leader_uuid.is_empty() {
                None
            } else {
                Some(self.leader_uuid.clone())
            },
            committed_config: self.committed_config().clone(),
            pending_config: self.pending_config.clone(),
        }
    }

    /// Adopts a committed consensus state learned from a peer: raises the
    /// term (clearing our vote) if the remote term is newer, forgets the
    /// observed leader, and replaces the committed config, dropping any
    /// pending change.
    pub fn merge_committed_state(&mut self, cstate: ConsensusState) {
        if cstate.current_term > self.record.current_term {
            self.set_current_term(cstate.current_term);
            self.clear_voted_for();
        }

        self.set_leader_uuid("");
        self.set_committed_config(cstate.committed_config);
        self.clear_pending_config();
    }

    // ---- sizes and counters ----

    pub fn on_disk_size(&self) -> u64 {
        self.on_disk_size
    }

    fn update_on_disk_size(&mut self) -> Result<(), CMetaError> {
        let path = self.fs_manager.meta_path(&self.group_id);
        self.on_disk_size = self.fs_manager.env().file_size(&path)?;
        Ok(())
    }

    /// Number of flushes performed by this instance. Test-visible.
    pub fn flush_count(&self) -> u64 {
        self.flush_count
    }
}

fn record_error_to_cmeta(e: RecordError) -> CMetaError {
    match e {
        RecordError::NotFound => CMetaError::NotFound,
        RecordError::AlreadyExists => CMetaError::AlreadyPresent(String::new()),
        RecordError::Corrupt(msg) => CMetaError::Corrupt(msg),
        RecordError::Io(io_err) => CMetaError::Io(io_err),
    }
}
