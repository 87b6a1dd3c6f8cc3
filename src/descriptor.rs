use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// HDA query descriptor, the JSON document POSTed to `/datarequest`.
///
/// Mirrors the broker's wire shape: a dataset id plus typed selection lists
/// (bounding box, date range, multi-value, single-choice). Usually loaded from
/// a local JSON file with [`QueryDescriptor::from_file`], or built up with the
/// keyword methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDescriptor {
    pub dataset_id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bounding_box_values: Vec<BoundingBoxValue>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub date_range_select_values: Vec<DateRangeSelect>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub multi_string_select_values: Vec<MultiStringSelect>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub string_choice_values: Vec<StringChoice>,
}

/// `[west, south, east, north]` in dataset-native coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBoxValue {
    pub name: String,
    pub bbox: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateRangeSelect {
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiStringSelect {
    pub name: String,
    pub value: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringChoice {
    pub name: String,
    pub value: String,
}

impl QueryDescriptor {
    pub fn new(dataset_id: impl Into<String>) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            ..Self::default()
        }
    }

    /// Parse a descriptor from a JSON string.
    pub fn from_json(s: &str) -> Result<Self> {
        let d: Self = serde_json::from_str(s)?;
        d.validate()?;
        Ok(d)
    }

    /// Load the local JSON descriptor file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let body = std::fs::read_to_string(path)?;
        Self::from_json(&body)
    }

    // Keyword-style builders, one per selection kind.

    pub fn bbox(mut self, name: impl Into<String>, bbox: [f64; 4]) -> Self {
        self.bounding_box_values.push(BoundingBoxValue {
            name: name.into(),
            bbox: bbox.to_vec(),
        });
        self
    }

    pub fn date_range(
        mut self,
        name: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        self.date_range_select_values.push(DateRangeSelect {
            name: name.into(),
            start,
            end,
        });
        self
    }

    pub fn select<V>(mut self, name: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self
    where
        V: Into<String>,
    {
        self.multi_string_select_values.push(MultiStringSelect {
            name: name.into(),
            value: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn choice(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.string_choice_values.push(StringChoice {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dataset_id.trim().is_empty() {
            return Err(Error::InvalidDescriptor("datasetId is empty".into()));
        }
        for r in &self.date_range_select_values {
            if r.end < r.start {
                return Err(Error::InvalidDescriptor(format!(
                    "date range `{}` ends before it starts ({} > {})",
                    r.name, r.start, r.end
                )));
            }
        }
        for b in &self.bounding_box_values {
            if b.bbox.len() != 4 {
                return Err(Error::InvalidDescriptor(format!(
                    "bounding box `{}` must have 4 values, got {}",
                    b.name,
                    b.bbox.len()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    const SAMPLE: &str = r#"{
        "datasetId": "EO:ECMWF:DAT:ERA5_HOURLY_DATA_ON_SINGLE_LEVELS",
        "boundingBoxValues": [{"name": "bbox", "bbox": [-11.0, 35.0, 35.0, 58.0]}],
        "dateRangeSelectValues": [
            {"name": "position", "start": "2019-01-01T00:00:00.000Z", "end": "2019-01-02T00:00:00.000Z"}
        ],
        "multiStringSelectValues": [{"name": "variable", "value": ["2m_temperature", "total_precipitation"]}],
        "stringChoiceValues": [{"name": "format", "value": "netcdf"}]
    }"#;

    #[test]
    fn parses_broker_wire_shape() {
        let d = QueryDescriptor::from_json(SAMPLE).unwrap();
        assert_eq!(d.dataset_id, "EO:ECMWF:DAT:ERA5_HOURLY_DATA_ON_SINGLE_LEVELS");
        assert_eq!(d.bounding_box_values[0].bbox, vec![-11.0, 35.0, 35.0, 58.0]);
        assert_eq!(d.multi_string_select_values[0].value.len(), 2);
        assert_eq!(d.string_choice_values[0].value, "netcdf");
        assert_eq!(
            d.date_range_select_values[0].start,
            Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn serializes_camel_case_keys() {
        let d = QueryDescriptor::new("EO:X")
            .bbox("bbox", [0.0, 0.0, 1.0, 1.0])
            .select("variable", ["msl"])
            .choice("format", "grib");
        let v = serde_json::to_value(&d).unwrap();
        assert!(v.get("datasetId").is_some());
        assert!(v.get("boundingBoxValues").is_some());
        assert!(v.get("multiStringSelectValues").is_some());
        assert!(v.get("stringChoiceValues").is_some());
        // Empty selection lists stay off the wire.
        assert!(v.get("dateRangeSelectValues").is_none());
    }

    #[test]
    fn rejects_empty_dataset_id() {
        let err = QueryDescriptor::new("  ").validate().unwrap_err();
        assert!(matches!(err, Error::InvalidDescriptor(_)));
    }

    #[test]
    fn rejects_inverted_date_range() {
        let start = Utc.with_ymd_and_hms(2019, 1, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2019, 1, 1, 0, 0, 0).unwrap();
        let d = QueryDescriptor::new("EO:X").date_range("position", start, end);
        assert!(matches!(
            d.validate().unwrap_err(),
            Error::InvalidDescriptor(_)
        ));
    }
}
