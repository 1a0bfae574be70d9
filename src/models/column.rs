//! # Column Schema Mapping
//!
//! Derives the analytics table design from a source table schema: drops
//! system-managed metadata columns and translates each remaining source
//! type through a fixed mapping. An unmapped source type is a hard error
//! rather than a silently invalid design sent downstream.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::OMITTED_COLUMNS;
use crate::error::{Result, SyncError};

/// A column as reported by the datastore schema API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceColumn {
    pub column_name: String,
    pub data_type: String,
}

/// Source column types with a defined analytics translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDataType {
    Text,
    Varchar,
    Date,
    Datetime,
    Int,
    Bigint,
    Double,
    Boolean,
    ForeignKey,
    EncryptedText,
}

impl FromStr for SourceDataType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "varchar" => Ok(Self::Varchar),
            "date" => Ok(Self::Date),
            "datetime" => Ok(Self::Datetime),
            "int" => Ok(Self::Int),
            "bigint" => Ok(Self::Bigint),
            "double" => Ok(Self::Double),
            "boolean" => Ok(Self::Boolean),
            "foreign key" => Ok(Self::ForeignKey),
            "encrypted text" => Ok(Self::EncryptedText),
            other => Err(format!("unsupported source column type: {other}")),
        }
    }
}

impl SourceDataType {
    /// Fixed source → analytics type translation.
    pub fn analytics_type(self) -> AnalyticsDataType {
        match self {
            Self::Text => AnalyticsDataType::MultiLine,
            Self::Varchar | Self::ForeignKey | Self::EncryptedText => AnalyticsDataType::Plain,
            Self::Date | Self::Datetime => AnalyticsDataType::Date,
            Self::Int | Self::Bigint => AnalyticsDataType::Number,
            Self::Double => AnalyticsDataType::DecimalNumber,
            Self::Boolean => AnalyticsDataType::Boolean,
        }
    }
}

/// Column types accepted by the analytics create-table API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalyticsDataType {
    MultiLine,
    Plain,
    Date,
    Number,
    DecimalNumber,
    Boolean,
}

impl fmt::Display for AnalyticsDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MultiLine => "MULTI_LINE",
            Self::Plain => "PLAIN",
            Self::Date => "DATE",
            Self::Number => "NUMBER",
            Self::DecimalNumber => "DECIMAL_NUMBER",
            Self::Boolean => "BOOLEAN",
        };
        write!(f, "{name}")
    }
}

/// One column of the analytics table design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ColumnSpec {
    pub columnname: String,
    pub datatype: AnalyticsDataType,
}

/// Derive the analytics table design from the source schema.
///
/// Drops the fixed exclusion set and maps every remaining type. Fails on
/// the first unmapped type so an invalid design never reaches the
/// analytics platform.
pub fn derive_column_specs(columns: &[SourceColumn]) -> Result<Vec<ColumnSpec>> {
    columns
        .iter()
        .filter(|column| !OMITTED_COLUMNS.contains(&column.column_name.as_str()))
        .map(|column| {
            let source_type: SourceDataType = column.data_type.parse().map_err(|message| {
                SyncError::internal(format!("column '{}': {message}", column.column_name))
            })?;
            Ok(ColumnSpec {
                columnname: column.column_name.clone(),
                datatype: source_type.analytics_type(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, data_type: &str) -> SourceColumn {
        SourceColumn {
            column_name: name.to_string(),
            data_type: data_type.to_string(),
        }
    }

    #[test]
    fn test_system_columns_dropped_and_types_mapped() {
        let columns = vec![
            source("CREATORID", "bigint"),
            source("CREATEDTIME", "datetime"),
            source("MODIFIEDTIME", "datetime"),
            source("QUANTITY", "int"),
            source("NOTES", "text"),
        ];
        let specs = derive_column_specs(&columns).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].columnname, "QUANTITY");
        assert_eq!(specs[0].datatype, AnalyticsDataType::Number);
        assert_eq!(specs[1].datatype, AnalyticsDataType::MultiLine);
    }

    #[test]
    fn test_full_type_table() {
        let cases = [
            ("text", AnalyticsDataType::MultiLine),
            ("varchar", AnalyticsDataType::Plain),
            ("date", AnalyticsDataType::Date),
            ("datetime", AnalyticsDataType::Date),
            ("int", AnalyticsDataType::Number),
            ("bigint", AnalyticsDataType::Number),
            ("double", AnalyticsDataType::DecimalNumber),
            ("boolean", AnalyticsDataType::Boolean),
            ("foreign key", AnalyticsDataType::Plain),
            ("encrypted text", AnalyticsDataType::Plain),
        ];
        for (raw, expected) in cases {
            let parsed: SourceDataType = raw.parse().unwrap();
            assert_eq!(parsed.analytics_type(), expected, "type {raw}");
        }
    }

    #[test]
    fn test_unmapped_type_fails_loudly() {
        let columns = vec![source("PAYLOAD", "geometry")];
        let err = derive_column_specs(&columns).unwrap_err();
        assert!(err.to_string().contains("geometry"));
    }

    #[test]
    fn test_spec_serialization_shape() {
        let spec = ColumnSpec {
            columnname: "NOTES".to_string(),
            datatype: AnalyticsDataType::MultiLine,
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["COLUMNNAME"], "NOTES");
        assert_eq!(json["DATATYPE"], "MULTI_LINE");
    }
}
