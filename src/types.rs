use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A required piece: cross-section and length in inches, and how many
/// identical pieces are needed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cut {
    pub width: f64,
    pub height: f64,
    pub length: f64,
    pub quantity: u64,
}

impl Cut {
    pub fn new(width: f64, height: f64, length: f64, quantity: u64) -> Self {
        Self {
            width,
            height,
            length,
            quantity,
        }
    }
}

impl std::fmt::Display for Cut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.length)
    }
}

/// A purchasable stock board: cross-section and length in inches, plus the
/// unit price per board.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub width: f64,
    pub height: f64,
    pub length: f64,
    pub price: f64,
}

impl Board {
    pub fn new(width: f64, height: f64, length: f64, price: f64) -> Self {
        Self {
            width,
            height,
            length,
            price,
        }
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.length)
    }
}

/// Editable field of a [`Cut`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutField {
    Width,
    Height,
    Length,
    Quantity,
}

impl std::str::FromStr for CutField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "width" => Ok(CutField::Width),
            "height" => Ok(CutField::Height),
            "length" => Ok(CutField::Length),
            "quantity" | "qty" => Ok(CutField::Quantity),
            _ => Err(format!(
                "unknown cut field '{}', expected: width, height, length, or quantity",
                s
            )),
        }
    }
}

/// Editable field of a [`Board`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardField {
    Width,
    Height,
    Length,
    Price,
}

impl std::str::FromStr for BoardField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "width" => Ok(BoardField::Width),
            "height" => Ok(BoardField::Height),
            "length" => Ok(BoardField::Length),
            "price" => Ok(BoardField::Price),
            _ => Err(format!(
                "unknown board field '{}', expected: width, height, length, or price",
                s
            )),
        }
    }
}

/// Everything the optimizer needs: the required cuts, the purchasable
/// boards, and an optional project name. Ordering of both sequences is part
/// of the contract — the solution references boards and cuts by position.
///
/// Also doubles as the `POST /optimize` request body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub cuts: Vec<Cut>,
    pub boards: Vec<Board>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

impl Default for Problem {
    /// A fresh problem starts with one example cut and one example board, so
    /// the user edits a populated form instead of an empty one.
    fn default() -> Self {
        Self {
            cuts: vec![Cut::new(2.0, 4.0, 24.0, 3)],
            boards: vec![Board::new(2.0, 4.0, 96.0, 8.0)],
            project_name: None,
        }
    }
}

impl Problem {
    pub fn empty() -> Self {
        Self {
            cuts: Vec::new(),
            boards: Vec::new(),
            project_name: None,
        }
    }

    /// Appends a new cut with placeholder dimensions.
    pub fn add_cut(&mut self) {
        self.cuts.push(Cut::new(2.0, 4.0, 12.0, 1));
    }

    /// Appends a new board with placeholder dimensions and price.
    pub fn add_board(&mut self) {
        self.boards.push(Board::new(2.0, 4.0, 96.0, 8.0));
    }

    /// Removes the cut at `index`, shifting later cuts down. Out-of-range
    /// indices are a no-op.
    pub fn remove_cut(&mut self, index: usize) {
        if index < self.cuts.len() {
            self.cuts.remove(index);
        }
    }

    /// Removes the board at `index`, shifting later boards down.
    /// Out-of-range indices are a no-op.
    pub fn remove_board(&mut self, index: usize) {
        if index < self.boards.len() {
            self.boards.remove(index);
        }
    }

    /// Sets one field of the cut at `index` from raw user input. Malformed
    /// input coerces to 0 instead of failing; validity is checked at
    /// submission time, not while editing.
    pub fn update_cut(&mut self, index: usize, field: CutField, raw: &str) {
        if let Some(cut) = self.cuts.get_mut(index) {
            match field {
                CutField::Width => cut.width = coerce_dimension(raw),
                CutField::Height => cut.height = coerce_dimension(raw),
                CutField::Length => cut.length = coerce_dimension(raw),
                CutField::Quantity => cut.quantity = coerce_count(raw),
            }
        }
    }

    /// Sets one field of the board at `index` from raw user input, with the
    /// same coercion policy as [`Problem::update_cut`].
    pub fn update_board(&mut self, index: usize, field: BoardField, raw: &str) {
        if let Some(board) = self.boards.get_mut(index) {
            match field {
                BoardField::Width => board.width = coerce_dimension(raw),
                BoardField::Height => board.height = coerce_dimension(raw),
                BoardField::Length => board.length = coerce_dimension(raw),
                BoardField::Price => board.price = coerce_dimension(raw),
            }
        }
    }

    /// A problem with no cuts or no boards cannot be submitted.
    pub fn is_submittable(&self) -> bool {
        !self.cuts.is_empty() && !self.boards.is_empty()
    }
}

/// Parses a dimension or price edit. Anything that is not a non-negative
/// finite number becomes 0.
fn coerce_dimension(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(0.0)
}

/// Parses a quantity edit. Negative and non-integer input becomes 0.
fn coerce_count(raw: &str) -> u64 {
    raw.trim().parse::<u64>().unwrap_or(0)
}

/// The optimizer's answer. Every map is keyed by the position of a board in
/// the submitted problem's board sequence; serde_json carries the keys as the
/// stringified indices the service emits (`{"0": 1}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// Board index → how many of that board to buy.
    pub board_plan: BTreeMap<usize, u64>,
    /// Board index → purchased board instances, each an ordered list of cut
    /// lengths laid out on that physical board.
    pub cut_plan: BTreeMap<usize, Vec<Vec<f64>>>,
    /// Board index → total leftover length across that board's instances.
    pub waste_summary: BTreeMap<usize, f64>,
    /// Sum of price × quantity over the board plan.
    pub total_cost: f64,
}

/// Who the current bearer token belongs to, as reported by the identity
/// endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// The persisted token pair. There is exactly one slot per machine; the
/// refresh token is stored and discarded with the access token but never
/// exchanged by this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
}

/// One persisted optimization run, owned by the identity that submitted it.
/// Entries are immutable after creation; reloading one copies its values
/// into a fresh problem and solution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    #[serde(default)]
    pub project_name: Option<String>,
    pub cuts: Vec<Cut>,
    pub boards: Vec<Board>,
    pub solution: Solution,
    pub total_cost: f64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_problem_matches_starter_form() {
        let p = Problem::default();
        assert_eq!(p.cuts, vec![Cut::new(2.0, 4.0, 24.0, 3)]);
        assert_eq!(p.boards, vec![Board::new(2.0, 4.0, 96.0, 8.0)]);
        assert_eq!(p.project_name, None);
        assert!(p.is_submittable());
    }

    #[test]
    fn test_add_appends_placeholders() {
        let mut p = Problem::default();
        p.add_cut();
        p.add_board();
        assert_eq!(p.cuts.len(), 2);
        assert_eq!(p.cuts[1], Cut::new(2.0, 4.0, 12.0, 1));
        assert_eq!(p.boards.len(), 2);
        assert_eq!(p.boards[1], Board::new(2.0, 4.0, 96.0, 8.0));
    }

    #[test]
    fn test_remove_shifts_higher_indices_down() {
        let mut p = Problem::empty();
        for len in [10.0, 20.0, 30.0] {
            p.cuts.push(Cut::new(2.0, 4.0, len, 1));
        }
        p.remove_cut(1);
        assert_eq!(p.cuts.len(), 2);
        assert_eq!(p.cuts[0].length, 10.0);
        assert_eq!(p.cuts[1].length, 30.0);
    }

    #[test]
    fn test_remove_out_of_range_is_noop() {
        let mut p = Problem::default();
        p.remove_cut(5);
        p.remove_board(5);
        assert_eq!(p.cuts.len(), 1);
        assert_eq!(p.boards.len(), 1);
    }

    #[test]
    fn test_removing_last_item_disables_submission() {
        let mut p = Problem::default();
        p.remove_cut(0);
        assert!(p.cuts.is_empty());
        assert!(!p.is_submittable());
    }

    #[test]
    fn test_update_with_valid_input() {
        let mut p = Problem::default();
        p.update_cut(0, CutField::Length, "36.5");
        p.update_cut(0, CutField::Quantity, "7");
        p.update_board(0, BoardField::Price, "12.25");
        assert_eq!(p.cuts[0].length, 36.5);
        assert_eq!(p.cuts[0].quantity, 7);
        assert_eq!(p.boards[0].price, 12.25);
    }

    #[test]
    fn test_update_with_garbage_coerces_to_zero() {
        let mut p = Problem::default();
        p.update_cut(0, CutField::Length, "abc");
        p.update_cut(0, CutField::Quantity, "three");
        p.update_board(0, BoardField::Price, "$8");
        assert_eq!(p.cuts[0].length, 0.0);
        assert_eq!(p.cuts[0].quantity, 0);
        assert_eq!(p.boards[0].price, 0.0);
    }

    #[test]
    fn test_update_with_negative_coerces_to_zero() {
        let mut p = Problem::default();
        p.update_cut(0, CutField::Width, "-2");
        p.update_cut(0, CutField::Quantity, "-3");
        p.update_board(0, BoardField::Price, "-8.5");
        assert_eq!(p.cuts[0].width, 0.0);
        assert_eq!(p.cuts[0].quantity, 0);
        assert_eq!(p.boards[0].price, 0.0);
    }

    #[test]
    fn test_update_with_non_finite_coerces_to_zero() {
        let mut p = Problem::default();
        p.update_cut(0, CutField::Length, "NaN");
        p.update_board(0, BoardField::Length, "inf");
        assert_eq!(p.cuts[0].length, 0.0);
        assert_eq!(p.boards[0].length, 0.0);
    }

    #[test]
    fn test_update_out_of_range_is_noop() {
        let mut p = Problem::default();
        p.update_cut(9, CutField::Length, "50");
        assert_eq!(p.cuts[0].length, 24.0);
    }

    #[test]
    fn test_identical_entries_stay_distinct() {
        let mut p = Problem::empty();
        p.cuts.push(Cut::new(2.0, 4.0, 24.0, 1));
        p.cuts.push(Cut::new(2.0, 4.0, 24.0, 1));
        assert_eq!(p.cuts.len(), 2);
        p.remove_cut(0);
        assert_eq!(p.cuts.len(), 1);
    }

    #[test]
    fn test_request_body_shape() {
        let p = Problem::default();
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("cuts").is_some());
        assert!(json.get("boards").is_some());
        // Absent project name is omitted entirely, not sent as null.
        assert!(json.get("project_name").is_none());
    }

    #[test]
    fn test_solution_round_trips_stringified_indices() {
        let body = serde_json::json!({
            "board_plan": {"0": 1},
            "cut_plan": {"0": [[24.0, 24.0, 24.0]]},
            "waste_summary": {"0": 24.0},
            "total_cost": 8.0
        });
        let solution: Solution = serde_json::from_value(body).unwrap();
        assert_eq!(solution.board_plan.get(&0), Some(&1));
        assert_eq!(solution.cut_plan[&0], vec![vec![24.0, 24.0, 24.0]]);
        assert_eq!(solution.waste_summary[&0], 24.0);

        let back = serde_json::to_value(&solution).unwrap();
        assert!(back["board_plan"].get("0").is_some());
    }

    #[test]
    fn test_board_display() {
        assert_eq!(Board::new(2.0, 4.0, 96.0, 8.0).to_string(), "2x4x96");
        assert_eq!(Board::new(0.75, 3.5, 96.0, 8.0).to_string(), "0.75x3.5x96");
    }
}
