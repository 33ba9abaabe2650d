//! The job-side adapter: jobspec IO, job read/write, event-log tailing,
//! counters, fixes, client creation and user lookup, all built on top of
//! a [`JobClient`] transport.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info, warn};

use p4dti_core::changelist::Changelist;
use p4dti_core::enums::{FixStatus, JobAckKind};
use p4dti_core::fix::Fix;
use p4dti_core::job::{Job, Jobspec, NEW_JOB_NAME, UNLINKED_SENTINEL};

use crate::error::{JobStoreError, Result};
use crate::jobspec::{self, JobspecIssue};
use crate::protocol::{JobClient, Record};

/// A job-side user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStoreUser {
    pub name: String,
    pub email: String,
}

/// Jobs and changelists changed since the event-log counter's previous
/// position, and the counter's new position.
pub struct ChangedJobs {
    pub jobs: Vec<Job>,
    pub changelists: Vec<Changelist>,
    pub next_entry: i64,
}

/// The job-side adapter contract the replicator core polls against.
pub trait JobStore: Send + Sync {
    fn read_jobspec(&self) -> Result<Jobspec>;
    fn write_jobspec(&self, spec: &Jobspec) -> Result<()>;
    fn validate_jobspec(&self, target: &Jobspec) -> Result<Vec<JobspecIssue>>;
    fn extend_jobspec(&self, target: &Jobspec, force: bool) -> Result<Jobspec>;

    fn job(&self, name: &str) -> Result<Job>;

    /// Writes `job`, forcing the write past a "no real change" server
    /// optimization when `force` is set (used by overwrite/refresh
    /// paths). Returns the possibly server-renamed job (`new` ->
    /// assigned name) and the ack kind so the caller can maintain its
    /// per-poll `job_updates` counter.
    fn write_job(&self, job: &Job, force: bool) -> Result<(Job, JobAckKind)>;

    /// Tails the event log after `counter_name`'s current position.
    /// `job_updates` absorbs self-written entries (decrementing in
    /// place); `accept_new` decides whether an unlinked new job is
    /// accepted for replication.
    fn changed_jobs(
        &self,
        counter_name: &str,
        job_updates: &mut HashMap<String, i32>,
        accept_new: &dyn Fn(&Job) -> bool,
    ) -> Result<ChangedJobs>;

    fn counter_get(&self, name: &str) -> Result<i64>;
    fn counter_set(&self, name: &str, value: i64) -> Result<()>;
    /// Creates the counter at `value` iff it does not already exist;
    /// never resets an existing counter.
    fn counter_init_if_missing(&self, name: &str, value: i64) -> Result<()>;

    fn changelist(&self, change: i64) -> Result<Option<Changelist>>;

    fn fixes_for_job(&self, name: &str) -> Result<Vec<Fix>>;
    fn add_fix(&self, name: &str, fix: &Fix) -> Result<()>;
    fn remove_fix(&self, name: &str, change: i64) -> Result<()>;

    fn ensure_client(&self, name: &str) -> Result<()>;

    fn user_by_name(&self, name: &str) -> Result<Option<JobStoreUser>>;
    fn all_users(&self) -> Result<Vec<JobStoreUser>>;

    /// Whether at least one job already exists, consulted by the
    /// startup check that refuses to proceed when the jobspec lacks the
    /// link fields but jobs are already present.
    fn any_jobs_exist(&self) -> Result<bool>;

    /// Lists every job on the server, full records included. Used by
    /// migration (enumerate candidates) and the consistency audit
    /// (detect orphan jobs marked with this rid); never called from the
    /// regular poll cycle, which relies on the event log instead.
    fn all_jobs(&self) -> Result<Vec<Job>>;
}

/// [`JobStore`] implementation driving a [`JobClient`].
pub struct ProcessJobStore<C: JobClient> {
    client: C,
}

impl<C: JobClient> ProcessJobStore<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    fn record_to_job(record: &Record) -> Result<Job> {
        let name = record
            .get("Job")
            .ok_or_else(|| JobStoreError::Parse("job record missing 'Job' field".to_string()))?
            .clone();

        let rid = record.get("P4DTI-rid").filter(|v| v.as_str() != UNLINKED_SENTINEL).cloned();
        let issue_id = record
            .get("P4DTI-issue-id")
            .filter(|v| v.as_str() != UNLINKED_SENTINEL)
            .map(|v| {
                v.parse::<i64>()
                    .map_err(|e| JobStoreError::Parse(format!("bad P4DTI-issue-id: {e}")))
            })
            .transpose()?;

        Ok(Job {
            name,
            rid,
            issue_id,
            user: record.get("P4DTI-user").cloned().unwrap_or_default(),
            fields: record.clone(),
        })
    }

    fn job_to_record(job: &Job) -> Record {
        let mut record: Record = job.fields.clone();
        record.insert("Job".to_string(), job.name.clone());
        record.insert(
            "P4DTI-rid".to_string(),
            job.rid.clone().unwrap_or_else(|| UNLINKED_SENTINEL.to_string()),
        );
        record.insert(
            "P4DTI-issue-id".to_string(),
            job.issue_id.map(|i| i.to_string()).unwrap_or_else(|| UNLINKED_SENTINEL.to_string()),
        );
        record.insert("P4DTI-user".to_string(), job.user.clone());
        record
    }

    fn record_to_changelist(record: &Record) -> Result<Changelist> {
        let change = field(record, "change")?.parse::<i64>().map_err(|e| JobStoreError::Parse(e.to_string()))?;
        let date = parse_timestamp(field(record, "date")?)?;
        Ok(Changelist {
            change,
            user: field(record, "user")?.clone(),
            client: record.get("client").cloned().unwrap_or_default(),
            description: record.get("description").cloned().unwrap_or_default(),
            status: field(record, "status")?.clone(),
            date,
        })
    }

    fn record_to_fix(record: &Record, issue_id: i64) -> Result<Fix> {
        let change = field(record, "change")?.parse::<i64>().map_err(|e| JobStoreError::Parse(e.to_string()))?;
        let date = parse_timestamp(field(record, "date")?)?;
        Ok(Fix {
            change,
            issue_id,
            status: FixStatus::from(field(record, "status")?.as_str()),
            user: field(record, "user")?.clone(),
            client: record.get("client").cloned().unwrap_or_default(),
            date,
        })
    }
}

fn field<'a>(record: &'a Record, name: &str) -> Result<&'a String> {
    record.get(name).ok_or_else(|| JobStoreError::Parse(format!("record missing field '{name}'")))
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(epoch) = s.parse::<i64>() {
        return Utc.timestamp_opt(epoch, 0).single().ok_or_else(|| JobStoreError::Parse(format!("bad epoch timestamp: {s}")));
    }
    DateTime::parse_from_str(s, "%Y/%m/%d %H:%M:%S %z")
        .or_else(|_| DateTime::parse_from_str(&format!("{s} +0000"), "%Y/%m/%d %H:%M:%S %z"))
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| JobStoreError::Parse(format!("bad date '{s}': {e}")))
}

impl<C: JobClient> JobStore for ProcessJobStore<C> {
    fn read_jobspec(&self) -> Result<Jobspec> {
        let records = self.client.run(&["jobspec".to_string(), "-o".to_string()], None)?;
        let mut fields = Vec::new();
        for record in &records {
            fields.push(p4dti_core::job::FieldDescriptor {
                code: field(record, "code")?.parse().map_err(|e| JobStoreError::Parse(format!("bad code: {e}")))?,
                name: field(record, "name")?.clone(),
                datatype: record.get("datatype").map(|s| s.as_str().into()).unwrap_or_default(),
                length: record.get("length").and_then(|s| s.parse().ok()).unwrap_or(0),
                persistence: record.get("persistence").map(|s| s.as_str().into()).unwrap_or_default(),
                preset: record.get("preset").cloned(),
                values: record.get("values").map(|v| v.split(',').map(str::to_owned).collect()).unwrap_or_default(),
            });
        }
        Ok(Jobspec { fields })
    }

    fn write_jobspec(&self, spec: &Jobspec) -> Result<()> {
        let mut record = Record::new();
        for (i, f) in spec.fields.iter().enumerate() {
            record.insert(format!("field{i}.code"), f.code.to_string());
            record.insert(format!("field{i}.name"), f.name.clone());
            record.insert(format!("field{i}.datatype"), f.datatype.to_string());
            record.insert(format!("field{i}.persistence"), f.persistence.to_string());
        }
        self.client.run(&["jobspec".to_string(), "-i".to_string()], Some(&record))?;
        info!(fields = spec.fields.len(), "installed jobspec");
        Ok(())
    }

    fn validate_jobspec(&self, target: &Jobspec) -> Result<Vec<JobspecIssue>> {
        let installed = self.read_jobspec()?;
        Ok(jobspec::validate_against_target(&installed, target))
    }

    fn extend_jobspec(&self, target: &Jobspec, force: bool) -> Result<Jobspec> {
        let installed = self.read_jobspec()?;
        let extended = jobspec::extend_jobspec(&installed, target, force);
        self.write_jobspec(&extended)?;
        self.read_jobspec()
    }

    fn job(&self, name: &str) -> Result<Job> {
        let records = self.client.run(&["job".to_string(), "-o".to_string(), name.to_string()], None)?;
        let record = records.first().ok_or_else(|| JobStoreError::NotFound(name.to_string()))?;
        Self::record_to_job(record)
    }

    fn write_job(&self, job: &Job, force: bool) -> Result<(Job, JobAckKind)> {
        let record = Self::job_to_record(job);
        let mut args = vec!["job".to_string(), "-i".to_string()];
        if force {
            args.push("-f".to_string());
        }
        let output = self.client.run(&args, Some(&record))?;

        let ack_text = output
            .first()
            .and_then(|r| r.get("ack"))
            .cloned()
            .unwrap_or_default();

        let ack = if ack_text.contains("not changed") {
            JobAckKind::Unchanged
        } else if ack_text.contains("saved") {
            JobAckKind::Saved
        } else {
            return Err(JobStoreError::UnexpectedAck {
                job: job.name.clone(),
                text: ack_text,
            });
        };

        let final_name = output
            .first()
            .and_then(|r| r.get("Job"))
            .cloned()
            .unwrap_or_else(|| job.name.clone());

        let mut saved = job.clone();
        saved.name = final_name;
        Ok((saved, ack))
    }

    fn changed_jobs(
        &self,
        counter_name: &str,
        job_updates: &mut HashMap<String, i32>,
        accept_new: &dyn Fn(&Job) -> bool,
    ) -> Result<ChangedJobs> {
        let position = self.counter_get(counter_name)?;
        let entries = self.client.run(
            &["journal".to_string(), "-a".to_string(), position.to_string()],
            None,
        )?;

        let mut jobs = Vec::new();
        let mut changelists = Vec::new();
        let mut next_entry = position;

        for entry in &entries {
            let entry_no: i64 = field(entry, "entry")?.parse().map_err(|e| JobStoreError::Parse(format!("bad entry: {e}")))?;
            next_entry = next_entry.max(entry_no);

            if let Some(name) = entry.get("job") {
                if name == NEW_JOB_NAME {
                    return Err(JobStoreError::ReservedJobName);
                }
                let pending = job_updates.entry(name.clone()).or_insert(0);
                if *pending > 0 {
                    *pending -= 1;
                    debug!(job = %name, "ignoring self-written event log entry");
                    continue;
                }

                let job = self.job(name)?;
                let owned_by_self = job.rid.is_some();
                let is_new = !owned_by_self && accept_new(&job);
                if owned_by_self || is_new {
                    jobs.push(job);
                }
            } else if let Some(change) = entry.get("change") {
                let change_no: i64 = change.parse().map_err(|e| JobStoreError::Parse(format!("bad change: {e}")))?;
                if let Some(cl) = self.changelist(change_no)? {
                    changelists.push(cl);
                } else {
                    warn!(change = change_no, "event log referenced a changelist that no longer exists, skipping");
                }
            }
        }

        Ok(ChangedJobs { jobs, changelists, next_entry })
    }

    fn counter_get(&self, name: &str) -> Result<i64> {
        let records = self.client.run(&["counter".to_string(), name.to_string()], None)?;
        match records.first().and_then(|r| r.get("value")) {
            Some(v) => v.parse().map_err(|e| JobStoreError::Parse(format!("bad counter value: {e}"))),
            None => Ok(0),
        }
    }

    fn counter_set(&self, name: &str, value: i64) -> Result<()> {
        self.client.run(
            &["counter".to_string(), "-s".to_string(), name.to_string(), value.to_string()],
            None,
        )?;
        Ok(())
    }

    fn counter_init_if_missing(&self, name: &str, value: i64) -> Result<()> {
        let records = self.client.run(&["counter".to_string(), name.to_string()], None)?;
        if records.first().and_then(|r| r.get("value")).is_some() {
            return Ok(());
        }
        self.counter_set(name, value)
    }

    fn changelist(&self, change: i64) -> Result<Option<Changelist>> {
        let result = self.client.run(
            &["describe".to_string(), "-s".to_string(), change.to_string()],
            None,
        );
        match result {
            Ok(records) => match records.first() {
                Some(r) => Ok(Some(Self::record_to_changelist(r)?)),
                None => Ok(None),
            },
            Err(JobStoreError::CommandFailed { stderr, .. }) if stderr.contains("no such changelist") => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn fixes_for_job(&self, name: &str) -> Result<Vec<Fix>> {
        let job = self.job(name)?;
        let issue_id = job.issue_id.unwrap_or_default();
        let records = self.client.run(&["fixes".to_string(), "-c".to_string(), name.to_string()], None)?;
        records.iter().map(|r| Self::record_to_fix(r, issue_id)).collect()
    }

    fn add_fix(&self, name: &str, fix: &Fix) -> Result<()> {
        let mut record = Record::new();
        record.insert("change".to_string(), fix.change.to_string());
        record.insert("status".to_string(), fix.status.to_string());
        self.client.run(&["fix".to_string(), "-c".to_string(), name.to_string()], Some(&record))?;
        Ok(())
    }

    fn remove_fix(&self, name: &str, change: i64) -> Result<()> {
        self.client.run(
            &["fix".to_string(), "-d".to_string(), "-c".to_string(), name.to_string(), change.to_string()],
            None,
        )?;
        Ok(())
    }

    fn ensure_client(&self, name: &str) -> Result<()> {
        let mut record = Record::new();
        record.insert("Client".to_string(), name.to_string());
        self.client.run(&["client".to_string(), "-i".to_string()], Some(&record))?;
        Ok(())
    }

    fn user_by_name(&self, name: &str) -> Result<Option<JobStoreUser>> {
        let records = self.client.run(&["user".to_string(), "-o".to_string(), name.to_string()], None)?;
        Ok(records.first().and_then(|r| {
            Some(JobStoreUser {
                name: r.get("User")?.clone(),
                email: r.get("Email").cloned().unwrap_or_default(),
            })
        }))
    }

    fn all_users(&self) -> Result<Vec<JobStoreUser>> {
        let records = self.client.run(&["users".to_string()], None)?;
        Ok(records
            .iter()
            .filter_map(|r| {
                Some(JobStoreUser {
                    name: r.get("User")?.clone(),
                    email: r.get("Email").cloned().unwrap_or_default(),
                })
            })
            .collect())
    }

    fn any_jobs_exist(&self) -> Result<bool> {
        let records = self.client.run(&["jobs".to_string(), "-m".to_string(), "1".to_string()], None)?;
        Ok(!records.is_empty())
    }

    fn all_jobs(&self) -> Result<Vec<Job>> {
        let records = self.client.run(&["jobs".to_string(), "-l".to_string()], None)?;
        records.iter().map(Self::record_to_job).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// An in-memory [`JobClient`] fake driven by a script of canned
    /// responses keyed by the joined argument vector, for unit-testing
    /// [`ProcessJobStore`] without a real subprocess.
    struct FakeClient {
        responses: Mutex<HashMap<String, Vec<Record>>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeClient {
        fn new() -> Self {
            Self { responses: Mutex::new(HashMap::new()), calls: Mutex::new(Vec::new()) }
        }

        fn on(&self, args: &[&str], response: Vec<Record>) {
            self.responses.lock().unwrap().insert(args.join(" "), response);
        }
    }

    impl JobClient for FakeClient {
        fn run(&self, args: &[String], _input: Option<&Record>) -> Result<Vec<Record>> {
            let key = args.join(" ");
            self.calls.lock().unwrap().push(key.clone());
            Ok(self.responses.lock().unwrap().get(&key).cloned().unwrap_or_default())
        }

        fn encoding_mode(&self) -> crate::protocol::EncodingMode {
            crate::protocol::EncodingMode::Utf8
        }
    }

    fn job_record(name: &str, rid: Option<&str>, issue_id: Option<&str>) -> Record {
        let mut r = Record::new();
        r.insert("Job".to_string(), name.to_string());
        r.insert("P4DTI-rid".to_string(), rid.unwrap_or(UNLINKED_SENTINEL).to_string());
        r.insert("P4DTI-issue-id".to_string(), issue_id.unwrap_or(UNLINKED_SENTINEL).to_string());
        r.insert("P4DTI-user".to_string(), "dt-user".to_string());
        r
    }

    #[test]
    fn job_parses_link_fields() {
        let client = FakeClient::new();
        client.on(&["job", "-o", "DT-1"], vec![job_record("DT-1", Some("DT"), Some("42"))]);
        let store = ProcessJobStore::new(client);
        let job = store.job("DT-1").unwrap();
        assert_eq!(job.rid.as_deref(), Some("DT"));
        assert_eq!(job.issue_id, Some(42));
    }

    #[test]
    fn job_unlinked_sentinel_parses_to_none() {
        let client = FakeClient::new();
        client.on(&["job", "-o", "DT-2"], vec![job_record("DT-2", None, None)]);
        let store = ProcessJobStore::new(client);
        let job = store.job("DT-2").unwrap();
        assert!(job.rid.is_none());
        assert!(job.issue_id.is_none());
    }

    #[test]
    fn write_job_saved_ack_increments_caller_counter() {
        let client = FakeClient::new();
        let mut ack = Record::new();
        ack.insert("ack".to_string(), "Job DT-1 saved.".to_string());
        ack.insert("Job".to_string(), "DT-1".to_string());
        client.on(&["job", "-i"], vec![ack]);
        let store = ProcessJobStore::new(client);
        let job = Job { name: "new".into(), rid: None, issue_id: None, user: String::new(), fields: BTreeMap::new() };
        let (saved, kind) = store.write_job(&job, false).unwrap();
        assert_eq!(saved.name, "DT-1");
        assert_eq!(kind, JobAckKind::Saved);
    }

    #[test]
    fn write_job_not_changed_ack_is_unchanged() {
        let client = FakeClient::new();
        let mut ack = Record::new();
        ack.insert("ack".to_string(), "Job DT-1 not changed.".to_string());
        client.on(&["job", "-i"], vec![ack]);
        let store = ProcessJobStore::new(client);
        let job = Job { name: "DT-1".into(), rid: None, issue_id: None, user: String::new(), fields: BTreeMap::new() };
        let (_, kind) = store.write_job(&job, false).unwrap();
        assert_eq!(kind, JobAckKind::Unchanged);
    }

    #[test]
    fn changed_jobs_decrements_self_written_entries() {
        let client = FakeClient::new();
        client.on(&["counter", "P4DTI-DT"], vec![]);
        let mut entry = Record::new();
        entry.insert("entry".to_string(), "5".to_string());
        entry.insert("job".to_string(), "DT-1".to_string());
        client.on(&["journal", "-a", "0"], vec![entry]);
        let store = ProcessJobStore::new(client);

        let mut job_updates = HashMap::new();
        job_updates.insert("DT-1".to_string(), 1);
        let result = store.changed_jobs("P4DTI-DT", &mut job_updates, &|_| true).unwrap();
        assert!(result.jobs.is_empty());
        assert_eq!(result.next_entry, 5);
        assert_eq!(job_updates.get("DT-1"), Some(&0));
    }

    #[test]
    fn changed_jobs_rejects_reserved_name() {
        let client = FakeClient::new();
        client.on(&["counter", "P4DTI-DT"], vec![]);
        let mut entry = Record::new();
        entry.insert("entry".to_string(), "1".to_string());
        entry.insert("job".to_string(), "new".to_string());
        client.on(&["journal", "-a", "0"], vec![entry]);
        let store = ProcessJobStore::new(client);
        let mut job_updates = HashMap::new();
        let err = store.changed_jobs("P4DTI-DT", &mut job_updates, &|_| true);
        assert!(matches!(err, Err(JobStoreError::ReservedJobName)));
    }

    #[test]
    fn changed_jobs_accepts_new_job_passing_predicate() {
        let client = FakeClient::new();
        client.on(&["counter", "P4DTI-DT"], vec![]);
        let mut entry = Record::new();
        entry.insert("entry".to_string(), "2".to_string());
        entry.insert("job".to_string(), "DT-9".to_string());
        client.on(&["journal", "-a", "0"], vec![entry]);
        client.on(&["job", "-o", "DT-9"], vec![job_record("DT-9", None, None)]);
        let store = ProcessJobStore::new(client);
        let mut job_updates = HashMap::new();
        let result = store.changed_jobs("P4DTI-DT", &mut job_updates, &|_| true).unwrap();
        assert_eq!(result.jobs.len(), 1);
        assert_eq!(result.jobs[0].name, "DT-9");
    }

    #[test]
    fn counter_init_if_missing_does_not_overwrite_existing() {
        let client = FakeClient::new();
        let mut val = Record::new();
        val.insert("value".to_string(), "99".to_string());
        client.on(&["counter", "P4DTI-DT"], vec![val]);
        let store = ProcessJobStore::new(client);
        store.counter_init_if_missing("P4DTI-DT", 0).unwrap();
        assert_eq!(store.counter_get("P4DTI-DT").unwrap(), 99);
    }

    #[test]
    fn any_jobs_exist_reflects_server_response() {
        let client = FakeClient::new();
        client.on(&["jobs", "-m", "1"], vec![job_record("DT-1", None, None)]);
        let store = ProcessJobStore::new(client);
        assert!(store.any_jobs_exist().unwrap());

        let empty_client = FakeClient::new();
        let empty_store = ProcessJobStore::new(empty_client);
        assert!(!empty_store.any_jobs_exist().unwrap());
    }

    #[test]
    fn all_jobs_parses_every_record() {
        let client = FakeClient::new();
        client.on(
            &["jobs", "-l"],
            vec![job_record("DT-1", Some("DT"), Some("1")), job_record("DT-2", None, None)],
        );
        let store = ProcessJobStore::new(client);
        let jobs = store.all_jobs().unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs[0].is_linked());
        assert!(!jobs[1].is_linked());
    }
}
