use crate::model::Ident;
use crate::rrd::DsSpec;

/// Decides how a datasource is shaped when an identity is first seen.
pub trait DsFinder: Send + Sync {
    fn find_matching_ds_spec(&self, ident: &Ident) -> DsSpec;
}

/// A [`DsFinder`] that hands out the same spec for every identity.
#[derive(Debug, Clone, Default)]
pub struct SimpleDsFinder {
    spec: DsSpec,
}

impl SimpleDsFinder {
    pub fn new(spec: DsSpec) -> Self {
        Self { spec }
    }
}

impl DsFinder for SimpleDsFinder {
    fn find_matching_ds_spec(&self, _ident: &Ident) -> DsSpec {
        self.spec.clone()
    }
}
