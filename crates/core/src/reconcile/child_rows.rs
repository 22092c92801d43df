use serde::{Deserialize, Serialize};

use crate::conditions::SqlValue;
use crate::ids::IdTable;
use crate::incid::{MultiplexCategory, MultiplexSlots};

/// A child row owned by one incid, identified positionally by its slot and
/// persisted under an application-allocated surrogate key.
pub trait ChildRow: Clone + std::fmt::Debug {
    fn id_table(&self) -> IdTable;

    fn row_id(&self) -> i32;

    fn set_row_id(&mut self, id: i32);

    fn incid(&self) -> &str;

    fn set_incid(&mut self, incid: &str);

    /// Non-key data values used for emptiness and duplicate checks.
    fn values(&self) -> Vec<SqlValue>;

    /// Every non-key column with its value, as written to the table.
    fn column_values(&self) -> Vec<(&'static str, SqlValue)>;

    /// Copies the authoritative fields of `desired` onto this row (non-null
    /// fields for slot tables). Returns true when anything changed.
    fn merge_from(&mut self, desired: &Self) -> bool;

    fn has_data(&self) -> bool {
        self.values().iter().any(|v| match v {
            SqlValue::Null => false,
            SqlValue::Text(t) => !t.trim().is_empty(),
            _ => true,
        })
    }
}

fn merge_field<T: Clone + PartialEq>(target: &mut Option<T>, source: &Option<T>) -> bool {
    match source {
        Some(value) if target.as_ref() != Some(value) => {
            *target = Some(value.clone());
            true
        }
        _ => false,
    }
}

/// One row of a multiplex child table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiplexRow {
    pub category: MultiplexCategory,
    pub id: i32,
    pub incid: String,
    pub code: Option<String>,
}

impl MultiplexRow {
    pub fn new(category: MultiplexCategory, incid: &str, code: Option<String>) -> Self {
        Self {
            category,
            id: 0,
            incid: incid.to_string(),
            code,
        }
    }

    /// Desired rows for one category, one entry per slot.
    pub fn desired_from_slots(
        category: MultiplexCategory,
        incid: &str,
        slots: &MultiplexSlots,
    ) -> Vec<Option<MultiplexRow>> {
        slots
            .slots(category)
            .iter()
            .map(|slot| {
                slot.as_ref()
                    .map(|code| MultiplexRow::new(category, incid, Some(code.clone())))
            })
            .collect()
    }
}

impl ChildRow for MultiplexRow {
    fn id_table(&self) -> IdTable {
        self.category.into()
    }

    fn row_id(&self) -> i32 {
        self.id
    }

    fn set_row_id(&mut self, id: i32) {
        self.id = id;
    }

    fn incid(&self) -> &str {
        &self.incid
    }

    fn set_incid(&mut self, incid: &str) {
        self.incid = incid.to_string();
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![self.code.clone().into()]
    }

    fn column_values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![(self.category.code_column(), self.code.clone().into())]
    }

    fn merge_from(&mut self, desired: &Self) -> bool {
        merge_field(&mut self.code, &desired.code)
    }
}

/// One evidence source row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceRow {
    pub incid_source_id: i32,
    pub incid: String,
    pub source_id: Option<i32>,
    pub source_date_start: Option<String>,
    pub source_habitat_class: Option<String>,
    pub source_habitat_type: Option<String>,
    pub source_boundary_importance: Option<String>,
    pub source_habitat_importance: Option<String>,
    pub sort_order: Option<i32>,
}

impl ChildRow for SourceRow {
    fn id_table(&self) -> IdTable {
        IdTable::Sources
    }

    fn row_id(&self) -> i32 {
        self.incid_source_id
    }

    fn set_row_id(&mut self, id: i32) {
        self.incid_source_id = id;
    }

    fn incid(&self) -> &str {
        &self.incid
    }

    fn set_incid(&mut self, incid: &str) {
        self.incid = incid.to_string();
    }

    fn values(&self) -> Vec<SqlValue> {
        vec![
            self.source_id.into(),
            self.source_date_start.clone().into(),
            self.source_habitat_class.clone().into(),
            self.source_habitat_type.clone().into(),
            self.source_boundary_importance.clone().into(),
            self.source_habitat_importance.clone().into(),
        ]
    }

    fn column_values(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            ("source_id", self.source_id.into()),
            ("source_date_start", self.source_date_start.clone().into()),
            ("source_habitat_class", self.source_habitat_class.clone().into()),
            ("source_habitat_type", self.source_habitat_type.clone().into()),
            (
                "source_boundary_importance",
                self.source_boundary_importance.clone().into(),
            ),
            (
                "source_habitat_importance",
                self.source_habitat_importance.clone().into(),
            ),
            ("sort_order", self.sort_order.into()),
        ]
    }

    fn merge_from(&mut self, desired: &Self) -> bool {
        // Evaluate every field; `|` keeps the merge from short-circuiting.
        merge_field(&mut self.source_id, &desired.source_id)
            | merge_field(&mut self.source_date_start, &desired.source_date_start)
            | merge_field(&mut self.source_habitat_class, &desired.source_habitat_class)
            | merge_field(&mut self.source_habitat_type, &desired.source_habitat_type)
            | merge_field(
                &mut self.source_boundary_importance,
                &desired.source_boundary_importance,
            )
            | merge_field(
                &mut self.source_habitat_importance,
                &desired.source_habitat_importance,
            )
            | merge_field(&mut self.sort_order, &desired.sort_order)
    }
}

/// Renumbers source sort orders densely (1, 2, ...) over filled slots.
pub fn renumber_sources(slots: &mut [Option<SourceRow>]) {
    let mut order = 0;
    for source in slots.iter_mut().flatten() {
        if source.has_data() {
            order += 1;
            source.sort_order = Some(order);
        }
    }
}
