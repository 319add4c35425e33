use std::error::Error;

use chrono::NaiveDateTime;
use tokio_postgres::types::{IsNull, ToSql, Type, to_sql_checked};
use tokio_util::bytes;

use crate::types::RowValues;

/// Borrowed Postgres parameters for one call.
pub struct Params<'a> {
    references: Vec<&'a (dyn ToSql + Sync)>,
}

impl<'a> Params<'a> {
    #[must_use]
    pub fn convert(params: &'a [RowValues]) -> Params<'a> {
        let references = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        Params { references }
    }

    #[must_use]
    pub fn as_refs(&self) -> &[&(dyn ToSql + Sync)] {
        &self.references
    }
}

fn timestamp_to_sql(
    dt: &NaiveDateTime,
    ty: &Type,
    out: &mut bytes::BytesMut,
) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
    match *ty {
        Type::TIMESTAMPTZ => dt.and_utc().to_sql(ty, out),
        Type::DATE => dt.date().to_sql(ty, out),
        _ => dt.to_sql(ty, out),
    }
}

impl ToSql for RowValues {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut bytes::BytesMut,
    ) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            // narrow to the column width; the wire format is fixed-size
            RowValues::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                _ => (*i).to_sql(ty, out),
            },
            #[allow(clippy::cast_possible_truncation)]
            RowValues::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                _ => (*f).to_sql(ty, out),
            },
            RowValues::Text(s) => s.to_sql(ty, out),
            RowValues::Bool(b) => (*b).to_sql(ty, out),
            RowValues::Timestamp(dt) => timestamp_to_sql(dt, ty, out),
            RowValues::Null => Ok(IsNull::Yes),
            RowValues::JSON(jsval) => jsval.to_sql(ty, out),
            RowValues::Blob(bytes) => bytes.to_sql(ty, out),
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::BOOL
                | Type::TIMESTAMP
                | Type::TIMESTAMPTZ
                | Type::DATE
                | Type::JSON
                | Type::JSONB
                | Type::BYTEA
        )
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ints_narrow_to_column_width() {
        let mut out = bytes::BytesMut::new();
        RowValues::Int(7).to_sql(&Type::INT4, &mut out).unwrap();
        assert_eq!(out.len(), 4);

        let mut out = bytes::BytesMut::new();
        RowValues::Int(7).to_sql(&Type::INT8, &mut out).unwrap();
        assert_eq!(out.len(), 8);

        let mut out = bytes::BytesMut::new();
        assert!(
            RowValues::Int(i64::from(i32::MAX) + 1)
                .to_sql(&Type::INT4, &mut out)
                .is_err()
        );
    }

    #[test]
    fn null_writes_nothing() {
        let mut out = bytes::BytesMut::new();
        let is_null = RowValues::Null.to_sql(&Type::TEXT, &mut out).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(out.is_empty());
    }

    #[test]
    fn accepts_common_types_only() {
        assert!(<RowValues as ToSql>::accepts(&Type::JSONB));
        assert!(!<RowValues as ToSql>::accepts(&Type::POINT));
    }
}
