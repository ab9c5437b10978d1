//! sled trees backing the engine and the CBOR helpers shared by every read and write
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree};
use sled::{Db, Tree};
use std::sync::Arc;

use crate::audit::AuditEntry;
use crate::calendar::Calendar;
use crate::entitlement::{LeaveAdjustment, LeaveEntitlement, entitlement_key};
use crate::error::{LeaveError, LeaveResult};
use crate::policy::LeavePolicy;
use crate::request::LeaveRequest;

pub(crate) type TxResult<T> = ConflictableTransactionResult<T, LeaveError>;

pub(crate) fn encode<T: minicbor::Encode<()>>(value: &T) -> LeaveResult<Vec<u8>> {
    Ok(minicbor::to_vec(value)?)
}

pub(crate) fn decode<T>(bytes: &[u8]) -> LeaveResult<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    Ok(minicbor::decode(bytes)?)
}

pub(crate) fn abort<T>(err: impl Into<LeaveError>) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err.into()))
}

pub(crate) fn tx_get<T>(tree: &TransactionalTree, key: &[u8]) -> TxResult<Option<T>>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    match tree.get(key)? {
        Some(bytes) => decode(&bytes).map(Some).map_err(ConflictableTransactionError::Abort),
        None => Ok(None),
    }
}

pub(crate) fn tx_put<T: minicbor::Encode<()>>(
    tree: &TransactionalTree,
    key: &[u8],
    value: &T,
) -> TxResult<()> {
    let bytes = encode(value).map_err(ConflictableTransactionError::Abort)?;
    tree.insert(key, bytes)?;
    Ok(())
}

/// `tag`, then `scope` behind its length, then `suffix`. The length prefix keeps one scope's
/// keys from ever falling under another scope's prefix, whatever characters the ids hold.
pub(crate) fn scoped_key(tag: &[u8], scope: &str, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(tag.len() + 8 + scope.len() + suffix.len());
    key.extend_from_slice(tag);
    key.extend_from_slice(&(scope.len() as u64).to_be_bytes());
    key.extend_from_slice(scope.as_bytes());
    key.extend_from_slice(suffix);
    key
}

/// Appends `entry` to its entity's chain inside a transaction.
pub(crate) fn tx_append_audit(audit: &TransactionalTree, entry: AuditEntry) -> TxResult<()> {
    let head_key = scoped_key(b"head", &entry.entity_id, b"");
    let prev = audit
        .get(&head_key)?
        .map(|digest| String::from_utf8_lossy(&digest).into_owned());
    let sealed = match entry.seal(prev) {
        Ok(sealed) => sealed,
        Err(e) => return abort(e),
    };
    let log_key = scoped_key(b"log", &sealed.entity_id, uuid7::uuid7().as_bytes());
    tx_put(audit, &log_key, &sealed)?;
    audit.insert(head_key, sealed.digest.as_bytes())?;
    Ok(())
}

pub(crate) fn employee_index_key(employee_id: &str, request_id: &str) -> Vec<u8> {
    scoped_key(b"", employee_id, request_id.as_bytes())
}

pub(crate) fn adjustment_key(employee_id: &str, adjustment_id: &str) -> Vec<u8> {
    scoped_key(b"", employee_id, adjustment_id.as_bytes())
}

fn read_version(bytes: Option<&[u8]>) -> LeaveResult<u64> {
    match bytes {
        None => Ok(0),
        Some(bytes) => <[u8; 8]>::try_from(bytes)
            .map(u64::from_be_bytes)
            .map_err(|_| LeaveError::LedgerInvariant("unreadable employee request version".into())),
    }
}

/// Moves the employee's request version past `seen`. Returns `false`, writing nothing, when
/// another writer has moved it since `seen` was read.
pub(crate) fn tx_advance_version(
    versions: &TransactionalTree,
    employee_id: &str,
    seen: u64,
) -> TxResult<bool> {
    let current = match read_version(versions.get(employee_id.as_bytes())?.as_deref()) {
        Ok(current) => current,
        Err(e) => return abort(e),
    };
    if current != seen {
        return Ok(false);
    }
    versions.insert(employee_id.as_bytes(), (seen + 1).to_be_bytes().to_vec())?;
    Ok(true)
}

/// Calendar and policy are read-mostly; everything else is mutated through transactions.
pub struct Store {
    pub(crate) db: Arc<Db>,
    pub(crate) requests: Tree,
    pub(crate) requests_by_employee: Tree,
    /// Per employee, bumped by every write that adds or moves days held by a request.
    pub(crate) employee_versions: Tree,
    pub(crate) entitlements: Tree,
    pub(crate) adjustments: Tree,
    pub(crate) audit: Tree,
    pub(crate) calendars: Tree,
    pub(crate) policies: Tree,
}

impl Store {
    pub fn open(db: Arc<Db>) -> LeaveResult<Self> {
        Ok(Self {
            requests: db.open_tree("requests")?,
            requests_by_employee: db.open_tree("requests_by_employee")?,
            employee_versions: db.open_tree("employee_versions")?,
            entitlements: db.open_tree("entitlements")?,
            adjustments: db.open_tree("adjustments")?,
            audit: db.open_tree("audit")?,
            calendars: db.open_tree("calendars")?,
            policies: db.open_tree("policies")?,
            db,
        })
    }

    pub fn flush(&self) -> LeaveResult<()> {
        self.db.flush()?;
        Ok(())
    }

    pub fn get_request(&self, request_id: &str) -> LeaveResult<Option<LeaveRequest>> {
        self.requests
            .get(request_id.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn requests_for_employee(&self, employee_id: &str) -> LeaveResult<Vec<LeaveRequest>> {
        let prefix = scoped_key(b"", employee_id, b"");
        let mut out = Vec::new();
        for item in self.requests_by_employee.scan_prefix(&prefix) {
            let (key, _) = item?;
            let request_id = &key[prefix.len()..];
            if let Some(bytes) = self.requests.get(request_id)? {
                out.push(decode(&bytes)?);
            }
        }
        Ok(out)
    }

    /// Version to hand back to [`tx_advance_version`] when persisting a write validated now.
    pub fn employee_version(&self, employee_id: &str) -> LeaveResult<u64> {
        read_version(self.employee_versions.get(employee_id.as_bytes())?.as_deref())
    }

    /// Every stored request. Rows that fail to decode are returned as errors in place.
    pub fn all_requests(&self) -> impl Iterator<Item = LeaveResult<LeaveRequest>> + '_ {
        self.requests
            .iter()
            .map(|item| item.map_err(LeaveError::from).and_then(|(_, v)| decode(&v)))
    }

    pub fn get_entitlement(
        &self,
        employee_id: &str,
        leave_type_id: &str,
        year: i32,
    ) -> LeaveResult<Option<LeaveEntitlement>> {
        let key = entitlement_key(employee_id, leave_type_id, year);
        self.entitlements
            .get(key.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    /// Every ledger row as `(key, row)`. Decoding is per row so one bad row can't hide the rest.
    pub fn all_entitlements(
        &self,
    ) -> impl Iterator<Item = (String, LeaveResult<LeaveEntitlement>)> + '_ {
        self.entitlements.iter().filter_map(|item| match item {
            Ok((k, v)) => Some((String::from_utf8_lossy(&k).into_owned(), decode(&v))),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read ledger row");
                None
            }
        })
    }

    pub fn adjustments_for(&self, employee_id: &str) -> LeaveResult<Vec<LeaveAdjustment>> {
        self.adjustments
            .scan_prefix(scoped_key(b"", employee_id, b""))
            .map(|item| decode(&item?.1))
            .collect()
    }

    pub fn audit_trail(&self, entity_id: &str) -> LeaveResult<Vec<AuditEntry>> {
        self.audit
            .scan_prefix(scoped_key(b"log", entity_id, b""))
            .map(|item| decode(&item?.1))
            .collect()
    }

    pub fn get_calendar(&self, year: i32) -> LeaveResult<Option<Calendar>> {
        self.calendars
            .get(year.to_be_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn put_calendar(&self, calendar: &Calendar) -> LeaveResult<()> {
        self.calendars
            .insert(calendar.year.to_be_bytes().to_vec(), encode(calendar)?)?;
        Ok(())
    }

    pub fn get_policy(&self, leave_type_id: &str) -> LeaveResult<Option<LeavePolicy>> {
        self.policies
            .get(leave_type_id.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub fn put_policy(&self, policy: &LeavePolicy) -> LeaveResult<()> {
        self.policies
            .insert(policy.leave_type_id.as_bytes(), encode(policy)?)?;
        Ok(())
    }
}
