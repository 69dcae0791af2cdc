//! Data providers consumed by the model: interaction records and the set of
//! items that must never be recommended.

use std::io::Read;
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord, Trim};
use fxhash::FxHashSet;

use crate::error::{RecError, Result};
use crate::mapping::{ItemId, UserId};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interaction {
    pub user: UserId,
    pub item: ItemId,
    pub rating: f32,
}

impl Interaction {
    pub fn new(user: UserId, item: ItemId, rating: f32) -> Self {
        Self { user, item, rating }
    }
}

/// Zip three parallel columns into interactions.
///
/// Columns of different lengths and non-finite ratings are rejected.
pub fn interactions_from_columns(
    users: &[UserId],
    items: &[ItemId],
    ratings: &[f32],
) -> Result<Vec<Interaction>> {
    check_len("items", users.len(), items.len())?;
    check_len("ratings", users.len(), ratings.len())?;
    users
        .iter()
        .zip(items)
        .zip(ratings)
        .enumerate()
        .map(|(n, ((&u, &i), &r))| {
            if !r.is_finite() {
                return Err(RecError::Parse {
                    line: n + 1,
                    reason: format!("non-finite rating `{r}`"),
                });
            }
            Ok(Interaction::new(u, i, r))
        })
        .collect()
}

pub(crate) fn check_len(column: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(RecError::LengthMismatch {
            column,
            expected,
            found,
        });
    }
    Ok(())
}

pub trait InteractionSource {
    fn interactions(&mut self) -> Result<Vec<Interaction>>;
}

impl InteractionSource for Vec<Interaction> {
    fn interactions(&mut self) -> Result<Vec<Interaction>> {
        Ok(std::mem::take(self))
    }
}

pub trait IneligibleSource {
    fn ineligible_items(&mut self) -> Result<FxHashSet<ItemId>>;
}

impl IneligibleSource for FxHashSet<ItemId> {
    fn ineligible_items(&mut self) -> Result<FxHashSet<ItemId>> {
        Ok(std::mem::take(self))
    }
}

/// Column names and delimiter of a delimited interaction table.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub user_key: String,
    pub item_key: String,
    pub rating_key: String,
    pub delimiter: u8,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            user_key: "user_id".to_string(),
            item_key: "item_id".to_string(),
            rating_key: "rating".to_string(),
            delimiter: b'\t',
        }
    }
}

/// Reads interactions from a delimited table whose first line is a header.
pub struct TsvInteractions<R> {
    reader: R,
    layout: TableLayout,
}

impl<R: Read> TsvInteractions<R> {
    pub fn new(reader: R, layout: TableLayout) -> Self {
        Self { reader, layout }
    }
}

impl<R: Read> InteractionSource for TsvInteractions<R> {
    fn interactions(&mut self) -> Result<Vec<Interaction>> {
        let mut reader = table_reader(&mut self.reader, self.layout.delimiter);
        let headers = reader.headers()?.clone();
        let user_col = column(&headers, &self.layout.user_key)?;
        let item_col = column(&headers, &self.layout.item_key)?;
        let rating_col = column(&headers, &self.layout.rating_key)?;

        let mut interactions = Vec::new();
        for record in reader.records() {
            let record = record?;
            let rating: f32 = parse_field(&record, rating_col, &self.layout.rating_key)?;
            if !rating.is_finite() {
                return Err(RecError::Parse {
                    line: record_line(&record),
                    reason: format!("non-finite rating `{rating}`"),
                });
            }
            interactions.push(Interaction {
                user: parse_field(&record, user_col, &self.layout.user_key)?,
                item: parse_field(&record, item_col, &self.layout.item_key)?,
                rating,
            });
        }
        tracing::info!("read {} interactions", interactions.len());
        Ok(interactions)
    }
}

/// Item profile table: items whose activity flag equals zero are ineligible.
pub struct InactiveItems<R> {
    reader: R,
    id_key: String,
    active_key: String,
    delimiter: u8,
}

impl<R: Read> InactiveItems<R> {
    pub fn new(reader: R, delimiter: u8) -> Self {
        Self {
            reader,
            id_key: "id".to_string(),
            active_key: "active_during_test".to_string(),
            delimiter,
        }
    }

    pub fn with_keys(mut self, id_key: &str, active_key: &str) -> Self {
        self.id_key = id_key.to_string();
        self.active_key = active_key.to_string();
        self
    }
}

impl<R: Read> IneligibleSource for InactiveItems<R> {
    fn ineligible_items(&mut self) -> Result<FxHashSet<ItemId>> {
        let mut reader = table_reader(&mut self.reader, self.delimiter);
        let headers = reader.headers()?.clone();
        let id_col = column(&headers, &self.id_key)?;
        let active_col = column(&headers, &self.active_key)?;

        let mut inactive = FxHashSet::default();
        for record in reader.records() {
            let record = record?;
            let active: f64 = parse_field(&record, active_col, &self.active_key)?;
            if active == 0.0 {
                inactive.insert(parse_field(&record, id_col, &self.id_key)?);
            }
        }
        tracing::info!("found {} inactive items", inactive.len());
        Ok(inactive)
    }
}

fn table_reader<R: Read>(reader: R, delimiter: u8) -> csv::Reader<R> {
    ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(reader)
}

fn column(headers: &StringRecord, key: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == key)
        .ok_or_else(|| RecError::MissingColumn(key.to_string()))
}

fn record_line(record: &StringRecord) -> usize {
    record.position().map_or(0, |p| p.line() as usize)
}

fn parse_field<T: FromStr>(record: &StringRecord, col: usize, key: &str) -> Result<T> {
    let field = record.get(col).unwrap_or_default();
    field.parse().map_err(|_| RecError::Parse {
        line: record_line(record),
        reason: format!("invalid value `{field}` in column `{key}`"),
    })
}
