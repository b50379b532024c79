//! Normalization of data type names referenced in command trees

use std::fmt;
use serde::Serialize;

/// Runtime data types a sequenced expression can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    String,
    Char,
    Boolean,
    Byte,
    Short,
    Integer,
    Long,
    BigInteger,
    Float,
    Double,
    BigDecimal,
    Date,
    Time,
    Timestamp,
    Object,
    Blob,
    Clob,
    Xml,
    Varbinary,
    Geometry,
    Geography,
    Json,
    Null,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "STRING",
            DataType::Char => "CHAR",
            DataType::Boolean => "BOOLEAN",
            DataType::Byte => "BYTE",
            DataType::Short => "SHORT",
            DataType::Integer => "INTEGER",
            DataType::Long => "LONG",
            DataType::BigInteger => "BIG_INTEGER",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::BigDecimal => "BIG_DECIMAL",
            DataType::Date => "DATE",
            DataType::Time => "TIME",
            DataType::Timestamp => "TIMESTAMP",
            DataType::Object => "OBJECT",
            DataType::Blob => "BLOB",
            DataType::Clob => "CLOB",
            DataType::Xml => "XML",
            DataType::Varbinary => "VARBINARY",
            DataType::Geometry => "GEOMETRY",
            DataType::Geography => "GEOGRAPHY",
            DataType::Json => "JSON",
            DataType::Null => "NULL",
        }
    }

    /// Look up a lower-cased alias
    fn from_alias(alias: &str) -> Option<Self> {
        let data_type = match alias {
            "string" | "varchar" | "nvarchar" | "text" | "character varying" | "char varying" => DataType::String,
            "char" | "character" | "nchar" => DataType::Char,
            "boolean" | "bool" | "bit" => DataType::Boolean,
            "byte" | "tinyint" => DataType::Byte,
            "short" | "smallint" | "int2" => DataType::Short,
            "integer" | "int" | "int4" | "serial" => DataType::Integer,
            "long" | "bigint" | "int8" | "bigserial" => DataType::Long,
            "biginteger" | "big_integer" => DataType::BigInteger,
            "float" | "real" | "float4" => DataType::Float,
            "double" | "double precision" | "float8" => DataType::Double,
            "bigdecimal" | "big_decimal" | "decimal" | "numeric" => DataType::BigDecimal,
            "date" => DataType::Date,
            "time" => DataType::Time,
            "timestamp" | "datetime" => DataType::Timestamp,
            "object" => DataType::Object,
            "blob" | "bytea" => DataType::Blob,
            "clob" => DataType::Clob,
            "xml" | "sqlxml" => DataType::Xml,
            "varbinary" | "binary" => DataType::Varbinary,
            "geometry" => DataType::Geometry,
            "geography" => DataType::Geography,
            "json" => DataType::Json,
            "null" => DataType::Null,
            _ => return None,
        };
        Some(data_type)
    }
}

/// A normalized type name, e.g. `STRING` or `INTEGER_ARRAY`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataTypeName {
    pub base: DataType,
    pub array: bool,
}

impl DataTypeName {
    pub const OBJECT: DataTypeName = DataTypeName {
        base: DataType::Object,
        array: false,
    };

    pub fn scalar(base: DataType) -> Self {
        Self { base, array: false }
    }
}

impl fmt::Display for DataTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.array {
            write!(f, "{}_ARRAY", self.base.as_str())
        } else {
            write!(f, "{}", self.base.as_str())
        }
    }
}

/// Maps raw type names found in trees to normalized names
pub trait DataTypeService: Send + Sync {
    /// `None` when the name is not recognized
    fn data_type_name(&self, raw: &str) -> Option<DataTypeName>;
}

/// Alias table covering SQL spellings, runtime names and qualified class names
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardTypes;

impl DataTypeService for StandardTypes {
    fn data_type_name(&self, raw: &str) -> Option<DataTypeName> {
        let mut name = raw.trim().to_ascii_lowercase();

        let mut array = false;
        for suffix in ["[]", "_array"] {
            if let Some(stripped) = name.strip_suffix(suffix) {
                name = stripped.trim_end().to_string();
                array = true;
                break;
            }
        }

        // varchar(255), decimal(10, 2)
        if let Some(open) = name.find('(') {
            name.truncate(open);
            name = name.trim_end().to_string();
        }

        // java.lang.String, java.sql.Timestamp
        if let Some(dot) = name.rfind('.') {
            name = name[dot + 1..].to_string();
        }

        let base = DataType::from_alias(&name)?;
        Some(DataTypeName { base, array })
    }
}
