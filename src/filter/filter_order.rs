use super::error::FilterError;
use super::filter::{quote_column, validate_identifier};
use super::types::FilterOrderInfo;

pub struct FilterOrder;

impl FilterOrder {
    pub fn generate(infos: &[FilterOrderInfo], alias: Option<&str>) -> Result<String, FilterError> {
        if infos.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(infos.len());
        for info in infos {
            if !validate_identifier(&info.column) {
                return Err(FilterError::InvalidColumn(info.column.clone()));
            }
            parts.push(format!("{} {}", quote_column(alias, &info.column), info.sort.to_sql()));
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }
}
