//! Derives the presentation model from a raw solution.
//!
//! Pure computation over a [`Solution`] and the board sequence it was
//! produced against, matched positionally. Three sections come out: the
//! shopping list, the per-board cutting instructions, and the waste summary.
//! Structural violations (a board index the problem never had, an instance
//! that overfills its board, more instances than boards purchased) fail
//! loudly; figures the service reports that merely disagree with what the
//! instances add up to are collected as inconsistencies for the caller to
//! show, never silently papered over.

use thiserror::Error;

use crate::types::{Board, Solution};

/// Float comparisons against service-reported totals.
const TOLERANCE: f64 = 1e-6;

/// A solution that fails its own structural invariants.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ReportError {
    #[error("solution references board #{0}, which the problem does not have")]
    UnknownBoard(usize),

    #[error(
        "board #{board} instance {instance}: cuts total {used}\" on a {length}\" board"
    )]
    NegativeWaste {
        board: usize,
        instance: usize,
        used: f64,
        length: f64,
    },

    #[error("board #{board}: {instances} boards laid out but only {purchased} purchased")]
    TooManyInstances {
        board: usize,
        instances: usize,
        purchased: u64,
    },
}

/// One shopping-list row: buy `quantity` of `board`.
#[derive(Debug, Clone, PartialEq)]
pub struct ShoppingLine {
    pub board_index: usize,
    pub board: Board,
    pub quantity: u64,
    pub line_cost: f64,
}

/// One physical board and the cuts laid out on it, in cutting order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardInstance {
    pub cuts: Vec<f64>,
    pub used: f64,
    pub waste: f64,
}

/// All instances of one board kind.
#[derive(Debug, Clone, PartialEq)]
pub struct CuttingGroup {
    pub board_index: usize,
    pub board: Board,
    pub instances: Vec<BoardInstance>,
}

/// Per-kind waste, as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct WasteLine {
    pub board_index: usize,
    pub board: Board,
    pub waste: f64,
}

/// The full presentation model for one solution.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub shopping_list: Vec<ShoppingLine>,
    /// Service-reported grand total, cross-checked against the lines.
    pub total_cost: f64,
    pub cutting: Vec<CuttingGroup>,
    pub waste: Vec<WasteLine>,
    pub total_waste: f64,
    /// Figures the service reported that disagree with what its own plan
    /// adds up to. Empty for a self-consistent solution.
    pub inconsistencies: Vec<String>,
}

/// Builds the report, validating the solution against `boards` — the exact
/// board sequence that was submitted, since the solution addresses boards by
/// position in it.
pub fn build_report(boards: &[Board], solution: &Solution) -> Result<Report, ReportError> {
    let mut inconsistencies = Vec::new();

    let mut shopping_list = Vec::new();
    let mut lines_total = 0.0;
    for (&index, &quantity) in &solution.board_plan {
        let board = *board_at(boards, index)?;
        let line_cost = board.price * quantity as f64;
        lines_total += line_cost;
        shopping_list.push(ShoppingLine {
            board_index: index,
            board,
            quantity,
            line_cost,
        });
    }
    if (lines_total - solution.total_cost).abs() > TOLERANCE {
        inconsistencies.push(format!(
            "reported total cost ${:.2} differs from the shopping list total ${:.2}",
            solution.total_cost, lines_total
        ));
    }

    let mut cutting = Vec::new();
    for (&index, instances) in &solution.cut_plan {
        let board = *board_at(boards, index)?;
        let purchased = solution.board_plan.get(&index).copied().unwrap_or(0);
        if instances.len() as u64 > purchased {
            return Err(ReportError::TooManyInstances {
                board: index,
                instances: instances.len(),
                purchased,
            });
        }

        let mut group = CuttingGroup {
            board_index: index,
            board,
            instances: Vec::with_capacity(instances.len()),
        };
        for (i, cuts) in instances.iter().enumerate() {
            let used: f64 = cuts.iter().sum();
            let waste = board.length - used;
            if waste < -TOLERANCE {
                return Err(ReportError::NegativeWaste {
                    board: index,
                    instance: i + 1,
                    used,
                    length: board.length,
                });
            }
            group.instances.push(BoardInstance {
                cuts: cuts.clone(),
                used,
                waste,
            });
        }

        let instance_waste: f64 = group.instances.iter().map(|b| b.waste).sum();
        if let Some(&reported) = solution.waste_summary.get(&index) {
            if (instance_waste - reported).abs() > TOLERANCE {
                inconsistencies.push(format!(
                    "board #{index}: reported waste {reported}\" differs from the cutting plan's {instance_waste}\""
                ));
            }
        }
        cutting.push(group);
    }

    let mut waste = Vec::new();
    let mut total_waste = 0.0;
    for (&index, &amount) in &solution.waste_summary {
        let board = *board_at(boards, index)?;
        total_waste += amount;
        waste.push(WasteLine {
            board_index: index,
            board,
            waste: amount,
        });
    }

    Ok(Report {
        shopping_list,
        total_cost: solution.total_cost,
        cutting,
        waste,
        total_waste,
        inconsistencies,
    })
}

fn board_at(boards: &[Board], index: usize) -> Result<&Board, ReportError> {
    boards.get(index).ok_or(ReportError::UnknownBoard(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn boards() -> Vec<Board> {
        vec![Board::new(2.0, 4.0, 96.0, 8.0)]
    }

    /// The starter scenario: three 24" cuts on one 96" board.
    fn solution() -> Solution {
        Solution {
            board_plan: BTreeMap::from([(0, 1)]),
            cut_plan: BTreeMap::from([(0, vec![vec![24.0, 24.0, 24.0]])]),
            waste_summary: BTreeMap::from([(0, 24.0)]),
            total_cost: 8.0,
        }
    }

    #[test]
    fn test_starter_scenario() {
        let report = build_report(&boards(), &solution()).unwrap();

        assert_eq!(report.shopping_list.len(), 1);
        assert_eq!(report.shopping_list[0].quantity, 1);
        assert_eq!(report.shopping_list[0].line_cost, 8.0);
        assert_eq!(report.total_cost, 8.0);

        let instance = &report.cutting[0].instances[0];
        assert_eq!(instance.used, 72.0);
        assert_eq!(instance.waste, 24.0);
        assert!(instance.used <= 96.0);
        assert_eq!(report.waste[0].waste, instance.waste);

        assert_eq!(report.total_waste, 24.0);
        assert!(report.inconsistencies.is_empty());
    }

    #[test]
    fn test_line_costs_sum_to_total() {
        let boards = vec![
            Board::new(2.0, 4.0, 96.0, 8.0),
            Board::new(2.0, 6.0, 120.0, 14.5),
        ];
        let solution = Solution {
            board_plan: BTreeMap::from([(0, 2), (1, 1)]),
            cut_plan: BTreeMap::new(),
            waste_summary: BTreeMap::new(),
            total_cost: 30.5,
        };
        let report = build_report(&boards, &solution).unwrap();
        let lines: f64 = report.shopping_list.iter().map(|l| l.line_cost).sum();
        assert_eq!(lines, 30.5);
        assert!(report.inconsistencies.is_empty());
    }

    #[test]
    fn test_total_cost_divergence_is_flagged() {
        let mut s = solution();
        s.total_cost = 9.5;
        let report = build_report(&boards(), &s).unwrap();
        assert_eq!(report.inconsistencies.len(), 1);
        assert!(report.inconsistencies[0].contains("total cost"));
        // The reported figure stays on display; it is flagged, not replaced.
        assert_eq!(report.total_cost, 9.5);
    }

    #[test]
    fn test_waste_summary_divergence_is_flagged() {
        let mut s = solution();
        s.waste_summary.insert(0, 30.0);
        let report = build_report(&boards(), &s).unwrap();
        assert_eq!(report.inconsistencies.len(), 1);
        assert!(report.inconsistencies[0].contains("waste"));
        assert_eq!(report.waste[0].waste, 30.0);
    }

    #[test]
    fn test_overfilled_board_fails() {
        let mut s = solution();
        s.cut_plan.insert(0, vec![vec![50.0, 50.0]]);
        let err = build_report(&boards(), &s).unwrap_err();
        assert_eq!(
            err,
            ReportError::NegativeWaste {
                board: 0,
                instance: 1,
                used: 100.0,
                length: 96.0,
            }
        );
    }

    #[test]
    fn test_more_instances_than_purchased_fails() {
        let mut s = solution();
        s.cut_plan
            .insert(0, vec![vec![24.0], vec![24.0]]);
        let err = build_report(&boards(), &s).unwrap_err();
        assert_eq!(
            err,
            ReportError::TooManyInstances {
                board: 0,
                instances: 2,
                purchased: 1,
            }
        );
    }

    #[test]
    fn test_unknown_board_index_fails() {
        let mut s = solution();
        s.board_plan.insert(7, 1);
        assert_eq!(
            build_report(&boards(), &s).unwrap_err(),
            ReportError::UnknownBoard(7)
        );
    }

    #[test]
    fn test_float_tolerance_is_not_a_false_positive() {
        let mut s = solution();
        s.total_cost = 8.0 + 1e-9;
        let report = build_report(&boards(), &s).unwrap();
        assert!(report.inconsistencies.is_empty());
    }
}
