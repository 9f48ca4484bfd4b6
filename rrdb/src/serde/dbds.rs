use std::sync::Arc;

use crate::model::Ident;
use crate::rrd::{DataSourcer, DsState, SharedArchive};

/// A datasource as known to the persistence layer.
///
/// Wraps the datasource payload with its identity and storage address: the
/// numeric `id` assigned by the backend and the `(seg, idx)` position used by
/// batched flushes. Cloning shares the payload; [`copy`](Self::copy) does not.
#[derive(Debug, Clone)]
pub struct DbDataSource {
    ds: Option<Arc<dyn DataSourcer>>,
    ident: Ident,
    id: i64,
    seg: i64,
    idx: i64,
    created: bool,
}

impl DbDataSource {
    pub fn new(
        id: i64,
        ident: Ident,
        seg: i64,
        idx: i64,
        ds: Option<Arc<dyn DataSourcer>>,
    ) -> Self {
        Self {
            ds,
            ident,
            id,
            seg,
            idx,
            created: false,
        }
    }

    /// Marks whether this value comes from the call that created the record.
    pub fn with_created(mut self, created: bool) -> Self {
        self.created = created;
        self
    }

    pub fn ident(&self) -> &Ident {
        &self.ident
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn seg(&self) -> i64 {
        self.seg
    }

    pub fn idx(&self) -> i64 {
        self.idx
    }

    pub fn created(&self) -> bool {
        self.created
    }

    /// The wrapped datasource, absent while a record is being assembled.
    pub fn ds(&self) -> Option<&Arc<dyn DataSourcer>> {
        self.ds.as_ref()
    }

    /// Archives of the wrapped datasource; empty without a payload.
    pub fn rras(&self) -> &[SharedArchive] {
        self.ds.as_deref().map(|ds| ds.rras()).unwrap_or_default()
    }

    pub fn state(&self) -> Option<DsState> {
        self.ds.as_ref().map(|ds| ds.state())
    }

    /// Returns an independent duplicate with the same id and address.
    ///
    /// The payload is copied through [`DataSourcer::copy`], so later writes
    /// to either side are not visible to the other. The copy is never marked
    /// as created.
    pub fn copy(&self) -> Self {
        Self {
            ds: self.ds.as_ref().map(|ds| ds.copy()),
            ident: self.ident.clone(),
            id: self.id,
            seg: self.seg,
            idx: self.idx,
            created: false,
        }
    }
}
