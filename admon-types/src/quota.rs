//! Quota records.
//!
//! Quota responses carry one element per user or group below `quotas`,
//! each with named child elements. Views show them as fixed-width rows
//! whose column positions are defined by the column enums below.

use std::fmt;
use std::marker::PhantomData;

/// Label shown when a quota response carried no quota collection.
pub const NO_QUOTA_LABEL: &str = "no quota data available";

/// A fixed set of table columns, each backed by a named XML child element.
pub trait QuotaColumns: Copy + fmt::Debug + 'static {
    /// All columns in table order.
    const ALL: &'static [Self];

    /// Position of this column in a row.
    fn index(self) -> usize;

    /// Name of the XML element holding this column's value.
    fn element(self) -> &'static str;
}

/// Columns of the quota usage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QuotaColumn {
    Name,
    Id,
    UsedSize,
    SizeLimit,
    UsedInodes,
    InodeLimit,
}

impl QuotaColumns for QuotaColumn {
    const ALL: &'static [Self] = &[
        QuotaColumn::Name,
        QuotaColumn::Id,
        QuotaColumn::UsedSize,
        QuotaColumn::SizeLimit,
        QuotaColumn::UsedInodes,
        QuotaColumn::InodeLimit,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn element(self) -> &'static str {
        match self {
            QuotaColumn::Name => "name",
            QuotaColumn::Id => "id",
            QuotaColumn::UsedSize => "usedSize",
            QuotaColumn::SizeLimit => "hardLimitSize",
            QuotaColumn::UsedInodes => "usedInodes",
            QuotaColumn::InodeLimit => "hardLimitInodes",
        }
    }
}

impl QuotaColumn {
    /// Column title for the given id type.
    pub fn title(self, id_type: QuotaIdType) -> &'static str {
        match (self, id_type) {
            (QuotaColumn::Name, QuotaIdType::User) => "user name",
            (QuotaColumn::Name, QuotaIdType::Group) => "group name",
            (QuotaColumn::Id, QuotaIdType::User) => "user ID",
            (QuotaColumn::Id, QuotaIdType::Group) => "group ID",
            (QuotaColumn::UsedSize, _) => "used size",
            (QuotaColumn::SizeLimit, _) => "size hard limit",
            (QuotaColumn::UsedInodes, _) => "used chunk files",
            (QuotaColumn::InodeLimit, _) => "chunk files hard limit",
        }
    }
}

/// Columns of the quota limit editing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QuotaLimitColumn {
    Name,
    Id,
    SizeLimit,
    InodeLimit,
}

impl QuotaColumns for QuotaLimitColumn {
    const ALL: &'static [Self] = &[
        QuotaLimitColumn::Name,
        QuotaLimitColumn::Id,
        QuotaLimitColumn::SizeLimit,
        QuotaLimitColumn::InodeLimit,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn element(self) -> &'static str {
        match self {
            QuotaLimitColumn::Name => "name",
            QuotaLimitColumn::Id => "id",
            QuotaLimitColumn::SizeLimit => "hardLimitSize",
            QuotaLimitColumn::InodeLimit => "hardLimitInodes",
        }
    }
}

/// Whether quota is queried for users or for groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum QuotaIdType {
    #[default]
    User,
    Group,
}

impl QuotaIdType {
    /// Value of the `idType` request parameter.
    pub fn as_param(&self) -> &'static str {
        match self {
            QuotaIdType::User => "user",
            QuotaIdType::Group => "group",
        }
    }
}

/// A fixed-width record whose positions are defined by `C`.
///
/// Every column always holds a value; fields missing from the source
/// record are empty strings.
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(bound = "")
)]
pub struct FixedRow<C: QuotaColumns> {
    values: Vec<String>,
    #[cfg_attr(feature = "serde", serde(skip))]
    columns: PhantomData<C>,
}

/// A row of the quota usage table.
pub type QuotaRow = FixedRow<QuotaColumn>;

/// A row of the quota limit table.
pub type QuotaLimitRow = FixedRow<QuotaLimitColumn>;

impl<C: QuotaColumns> FixedRow<C> {
    /// Create a row with every column empty.
    pub fn new() -> Self {
        Self {
            values: vec![String::new(); C::ALL.len()],
            columns: PhantomData,
        }
    }

    /// Build a row by looking up every column's value.
    pub fn from_lookup<F>(mut lookup: F) -> Self
    where
        F: FnMut(C) -> Option<String>,
    {
        let mut row = Self::new();
        for &column in C::ALL {
            if let Some(value) = lookup(column) {
                row.set(column, value);
            }
        }
        row
    }

    /// Value of a column.
    pub fn get(&self, column: C) -> &str {
        &self.values[column.index()]
    }

    /// Replace the value of a column.
    pub fn set(&mut self, column: C, value: impl Into<String>) {
        self.values[column.index()] = value.into();
    }

    /// All values in column order.
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

impl<C: QuotaColumns> Default for FixedRow<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: QuotaColumns> fmt::Debug for FixedRow<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for &column in C::ALL {
            map.entry(&column, &self.get(column));
        }
        map.finish()
    }
}
