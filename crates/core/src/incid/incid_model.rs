use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{
    COMPLEX_SLOTS, FORMATION_SLOTS, FRAGMENT_ID_WIDTH, IHS_SUMMARY_SEPARATOR,
    INCID_NUMBER_WIDTH, MANAGEMENT_SLOTS, MATRIX_SLOTS, MAX_INCID_NUMBER,
};
use crate::errors::{Error, ValidationError};

/// Parsed incid identifier: `<site>:<number>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IncidId {
    pub site: String,
    pub number: u32,
}

impl IncidId {
    pub fn new(site: impl Into<String>, number: u32) -> Self {
        Self {
            site: site.into(),
            number,
        }
    }

    pub fn parse(value: &str) -> Result<Self, Error> {
        let invalid = || Error::from(ValidationError::InvalidIncid(value.to_string()));
        let (site, number) = value.split_once(':').ok_or_else(invalid)?;
        if site.is_empty() || number.len() != INCID_NUMBER_WIDTH {
            return Err(invalid());
        }
        let number = number.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self::new(site, number))
    }

    /// The following identifier of the same site. Fails once the numeric
    /// part would no longer fit its fixed width.
    pub fn next(&self) -> Result<Self, Error> {
        if self.number >= MAX_INCID_NUMBER {
            return Err(ValidationError::IncidNumbersExhausted(self.site.clone()).into());
        }
        Ok(Self::new(self.site.clone(), self.number + 1))
    }
}

impl fmt::Display for IncidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{:0width$}",
            self.site,
            self.number,
            width = INCID_NUMBER_WIDTH
        )
    }
}

impl FromStr for IncidId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IncidId::parse(s)
    }
}

/// Formats a fragment number as the zero-padded `toid_fragment_id`.
pub fn format_fragment_id(number: u32) -> String {
    format!("{:0width$}", number, width = FRAGMENT_ID_WIDTH)
}

/// Numeric value of a fragment id; non-numeric ids count as zero.
pub fn parse_fragment_id(value: &str) -> u32 {
    value.trim().parse().unwrap_or(0)
}

/// The incid header row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incid {
    pub incid: String,
    pub ihs_version: i32,
    pub ihs_habitat: Option<String>,
    pub ihs_category: Option<String>,
    pub ihs_summary: Option<String>,
    pub site_ref: Option<String>,
    pub site_name: Option<String>,
    pub boundary_base_map: Option<String>,
    pub digitisation_base_map: Option<String>,
    pub general_comments: Option<String>,
    pub created_date: String,
    pub created_user_id: String,
    pub last_modified_date: String,
    pub last_modified_user_id: String,
}

/// Multiplex attribute categories, each with a fixed number of slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiplexCategory {
    Matrix,
    Formation,
    Management,
    Complex,
}

impl MultiplexCategory {
    pub const ALL: [MultiplexCategory; 4] = [
        MultiplexCategory::Matrix,
        MultiplexCategory::Formation,
        MultiplexCategory::Management,
        MultiplexCategory::Complex,
    ];

    pub fn max_slots(&self) -> usize {
        match self {
            MultiplexCategory::Matrix => MATRIX_SLOTS,
            MultiplexCategory::Formation => FORMATION_SLOTS,
            MultiplexCategory::Management => MANAGEMENT_SLOTS,
            MultiplexCategory::Complex => COMPLEX_SLOTS,
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            MultiplexCategory::Matrix => "incid_ihs_matrix",
            MultiplexCategory::Formation => "incid_ihs_formation",
            MultiplexCategory::Management => "incid_ihs_management",
            MultiplexCategory::Complex => "incid_ihs_complex",
        }
    }

    pub fn id_column(&self) -> &'static str {
        match self {
            MultiplexCategory::Matrix => "matrix_id",
            MultiplexCategory::Formation => "formation_id",
            MultiplexCategory::Management => "management_id",
            MultiplexCategory::Complex => "complex_id",
        }
    }

    pub fn code_column(&self) -> &'static str {
        match self {
            MultiplexCategory::Matrix => "matrix",
            MultiplexCategory::Formation => "formation",
            MultiplexCategory::Management => "management",
            MultiplexCategory::Complex => "complex",
        }
    }

    /// Lookup table holding the valid codes.
    pub fn lookup_table(&self) -> &'static str {
        match self {
            MultiplexCategory::Matrix => "lut_ihs_matrix",
            MultiplexCategory::Formation => "lut_ihs_formation",
            MultiplexCategory::Management => "lut_ihs_management",
            MultiplexCategory::Complex => "lut_ihs_complex",
        }
    }

    /// Lookup table pairing habitat codes with the codes they allow.
    pub fn habitat_lookup_table(&self) -> &'static str {
        match self {
            MultiplexCategory::Matrix => "lut_ihs_habitat_ihs_matrix",
            MultiplexCategory::Formation => "lut_ihs_habitat_ihs_formation",
            MultiplexCategory::Management => "lut_ihs_habitat_ihs_management",
            MultiplexCategory::Complex => "lut_ihs_habitat_ihs_complex",
        }
    }
}

impl fmt::Display for MultiplexCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code_column())
    }
}

/// Fixed-size slot arrays per multiplex category. Slot `i` is the `i`th
/// persisted row of the category in display order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiplexSlots {
    pub matrix: [Option<String>; MATRIX_SLOTS],
    pub formation: [Option<String>; FORMATION_SLOTS],
    pub management: [Option<String>; MANAGEMENT_SLOTS],
    pub complex: [Option<String>; COMPLEX_SLOTS],
}

impl MultiplexSlots {
    pub fn slots(&self, category: MultiplexCategory) -> &[Option<String>] {
        match category {
            MultiplexCategory::Matrix => &self.matrix,
            MultiplexCategory::Formation => &self.formation,
            MultiplexCategory::Management => &self.management,
            MultiplexCategory::Complex => &self.complex,
        }
    }

    pub fn slots_mut(&mut self, category: MultiplexCategory) -> &mut [Option<String>] {
        match category {
            MultiplexCategory::Matrix => &mut self.matrix,
            MultiplexCategory::Formation => &mut self.formation,
            MultiplexCategory::Management => &mut self.management,
            MultiplexCategory::Complex => &mut self.complex,
        }
    }

    /// Fills a category from persisted codes in display order; extra codes
    /// beyond the slot count are ignored.
    pub fn fill(&mut self, category: MultiplexCategory, codes: impl IntoIterator<Item = String>) {
        let slots = self.slots_mut(category);
        for slot in slots.iter_mut() {
            *slot = None;
        }
        for (slot, code) in slots.iter_mut().zip(codes) {
            *slot = Some(code);
        }
    }

    /// Makes every category dense: blank and repeated codes are dropped and
    /// the remaining codes shift towards slot 0, keeping their order.
    pub fn compact(&mut self) {
        for category in MultiplexCategory::ALL {
            let mut codes: Vec<String> = Vec::new();
            for code in self.codes(category) {
                if !codes.iter().any(|c| c == code) {
                    codes.push(code.to_string());
                }
            }
            self.fill(category, codes);
        }
    }

    pub fn has_any(&self, category: MultiplexCategory) -> bool {
        self.slots(category).iter().any(|s| is_filled(s))
    }

    /// Non-empty codes of one category in slot order.
    pub fn codes(&self, category: MultiplexCategory) -> Vec<&str> {
        self.slots(category)
            .iter()
            .filter_map(|s| s.as_deref())
            .filter(|s| !s.trim().is_empty())
            .collect()
    }

    /// Non-empty codes of every category, matrix first.
    pub fn all_codes(&self) -> Vec<&str> {
        MultiplexCategory::ALL
            .iter()
            .flat_map(|c| self.codes(*c))
            .collect()
    }
}

fn is_filled(slot: &Option<String>) -> bool {
    slot.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// Summary string: habitat followed by every multiplex code, dot separated.
pub fn derive_ihs_summary(habitat: Option<&str>, multiplex: &MultiplexSlots) -> Option<String> {
    let parts = habitat
        .filter(|h| !h.trim().is_empty())
        .into_iter()
        .chain(multiplex.all_codes())
        .collect::<Vec<_>>();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(IHS_SUMMARY_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incid_id_round_trips() {
        let id = IncidId::parse("HLU:0000042").unwrap();
        assert_eq!(id.site, "HLU");
        assert_eq!(id.number, 42);
        assert_eq!(id.to_string(), "HLU:0000042");
        assert_eq!(id.next().unwrap().to_string(), "HLU:0000043");
    }

    #[test]
    fn last_incid_number_has_no_successor() {
        let last = IncidId::parse("HLU:9999999").unwrap();
        let err = last.next().unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::IncidNumbersExhausted(ref site)) if site == "HLU"
        ));
        assert_eq!(IncidId::new("HLU", 9_999_998).next().unwrap().to_string(), "HLU:9999999");
    }

    #[test]
    fn malformed_incid_is_rejected() {
        for value in ["HLU0000042", "HLU:42", ":0000042", "HLU:00000x2"] {
            assert!(IncidId::parse(value).is_err(), "{value}");
        }
    }

    #[test]
    fn fragment_ids_are_zero_padded() {
        assert_eq!(format_fragment_id(3), "00003");
        assert_eq!(parse_fragment_id("00017"), 17);
        assert_eq!(parse_fragment_id("bad"), 0);
    }

    #[test]
    fn summary_joins_habitat_and_multiplex_codes() {
        let mut slots = MultiplexSlots::default();
        slots.fill(MultiplexCategory::Matrix, vec!["M1".to_string(), "M2".to_string()]);
        slots.complex[1] = Some("C1".to_string());
        slots.formation[0] = Some("  ".to_string());
        assert_eq!(
            derive_ihs_summary(Some("GA0"), &slots),
            Some("GA0.M1.M2.C1".to_string())
        );
        assert_eq!(derive_ihs_summary(None, &MultiplexSlots::default()), None);
    }

    #[test]
    fn compact_removes_gaps_and_repeats() {
        let mut slots = MultiplexSlots::default();
        slots.matrix = [None, Some("M1".to_string()), Some("M1".to_string())];
        slots.management = [Some(" ".to_string()), Some("G2".to_string())];
        slots.compact();
        assert_eq!(slots.matrix, [Some("M1".to_string()), None, None]);
        assert_eq!(slots.management, [Some("G2".to_string()), None]);
    }

    #[test]
    fn fill_truncates_to_slot_count() {
        let mut slots = MultiplexSlots::default();
        slots.fill(
            MultiplexCategory::Formation,
            ["F1", "F2", "F3"].iter().map(|s| s.to_string()),
        );
        assert_eq!(slots.codes(MultiplexCategory::Formation), vec!["F1", "F2"]);
    }
}
