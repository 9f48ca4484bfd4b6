use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Ident;
use crate::rrd::{DataSource, DataSourcer, DsState, SharedArchive};

use super::DbDataSource;

/// The flattened row a durable backend stores per datasource.
///
/// The optional fields are all `None` for a datasource that was never
/// updated. Archives are not part of the row; backends store them separately
/// and pass them back through [`DsRecord::into_db_data_source`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DsRecord {
    pub id: i64,
    pub ident_json: Vec<u8>,
    pub step_ms: i64,
    pub hb_ms: i64,
    pub last_update: Option<i64>,
    pub value: Option<f64>,
    pub duration_ms: Option<i64>,
    pub seg: i64,
    pub idx: i64,
    pub created: bool,
}

impl DsRecord {
    /// Rebuilds the datasource, attaching `rras` as its archives.
    pub fn into_db_data_source(self, rras: Vec<SharedArchive>) -> Result<DbDataSource> {
        let ident = Ident::from_json(&self.ident_json)?;
        let step = millis("step_ms", self.step_ms)?;
        let heartbeat = millis("hb_ms", self.hb_ms)?;
        let state = DsState {
            last_update: self.last_update,
            value: self.value.unwrap_or(f64::NAN),
            duration: self
                .duration_ms
                .map(|ms| millis("duration_ms", ms))
                .transpose()?
                .unwrap_or_default(),
        };
        let ds = DataSource::with_parts(step, heartbeat, state, rras);
        Ok(DbDataSource::new(self.id, ident, self.seg, self.idx, Some(Arc::new(ds)))
            .with_created(self.created))
    }
}

fn millis(field: &str, ms: i64) -> Result<Duration> {
    u64::try_from(ms)
        .map(Duration::from_millis)
        .map_err(|_| Error::Encoding(format!("negative {field}: {ms}")))
}

impl TryFrom<&DbDataSource> for DsRecord {
    type Error = Error;

    fn try_from(ds: &DbDataSource) -> Result<Self> {
        let payload = ds.ds().ok_or_else(|| {
            Error::InvalidInput(format!("datasource {} has no payload", ds.id()))
        })?;
        let state = payload.state();
        let updated = state.last_update.is_some();
        Ok(Self {
            id: ds.id(),
            ident_json: ds.ident().to_json()?,
            step_ms: payload.step().as_millis() as i64,
            hb_ms: payload.heartbeat().as_millis() as i64,
            last_update: state.last_update,
            value: updated.then_some(state.value),
            duration_ms: updated.then_some(state.duration.as_millis() as i64),
            seg: ds.seg(),
            idx: ds.idx(),
            created: ds.created(),
        })
    }
}

impl TryFrom<DsRecord> for DbDataSource {
    type Error = Error;

    fn try_from(record: DsRecord) -> Result<Self> {
        record.into_db_data_source(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rrd::DsSpec;

    fn record() -> DsRecord {
        DsRecord {
            id: 42,
            ident_json: br#"{"name":"a"}"#.to_vec(),
            step_ms: 10_000,
            hb_ms: 7_200_000,
            last_update: None,
            value: None,
            duration_ms: None,
            seg: 0,
            idx: 41,
            created: true,
        }
    }

    #[test]
    fn should_round_trip_through_record() {
        // given
        let ds = DataSource::new(&DsSpec::default());
        ds.set_state(DsState {
            last_update: Some(1_000),
            value: 2.5,
            duration: Duration::from_millis(500),
        });
        let original = DbDataSource::new(
            9,
            Ident::from([("name", "cpu"), ("host", "a")]),
            2,
            5,
            Some(Arc::new(ds)),
        )
        .with_created(true);

        // when
        let record = DsRecord::try_from(&original).unwrap();
        let restored = DbDataSource::try_from(record.clone()).unwrap();

        // then
        assert_eq!(record.value, Some(2.5));
        assert_eq!(record.duration_ms, Some(500));
        assert_eq!(restored.id(), original.id());
        assert_eq!(restored.ident(), original.ident());
        assert_eq!((restored.seg(), restored.idx()), (2, 5));
        assert!(restored.created());
        assert_eq!(restored.state(), original.state());
        let payload = restored.ds().unwrap();
        assert_eq!(payload.step(), Duration::from_secs(10));
        assert_eq!(payload.heartbeat(), Duration::from_secs(7200));
    }

    #[test]
    fn should_map_never_updated_to_empty_fields() {
        // given
        let restored = DbDataSource::try_from(record()).unwrap();

        // when
        let state = restored.state().unwrap();
        let again = DsRecord::try_from(&restored).unwrap();

        // then
        assert_eq!(state.last_update, None);
        assert!(state.value.is_nan());
        assert_eq!(again, record());
    }

    #[test]
    fn should_reject_record_without_payload() {
        // given
        let ds = DbDataSource::new(1, Ident::from([("name", "a")]), 0, 0, None);

        // when
        let result = DsRecord::try_from(&ds);

        // then
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn should_reject_malformed_ident() {
        // given
        let record = DsRecord {
            ident_json: b"not json".to_vec(),
            ..record()
        };

        // when
        let result = DbDataSource::try_from(record);

        // then
        assert!(matches!(result, Err(Error::Encoding(_))));
    }

    #[test]
    fn should_reject_negative_step() {
        // given
        let record = DsRecord {
            step_ms: -1,
            ..record()
        };

        // when/then
        assert!(matches!(
            DbDataSource::try_from(record),
            Err(Error::Encoding(_))
        ));
    }
}
