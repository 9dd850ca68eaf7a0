use crate::domain::Participation;

pub const WIN_POINTS: i64 = 3;
pub const DRAW_POINTS: i64 = 1;

/// Order group participants by accumulated points, best first.
///
/// The sort is stable, so equal-point participants keep their incoming
/// order; no secondary tiebreak is applied.
pub fn order_by_points(mut participants: Vec<Participation>) -> Vec<Participation> {
    participants.sort_by(|a, b| b.group_points.cmp(&a.group_points));
    participants
}

/// Outcome of closing a match's voting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchDecision {
    Winner(i64),
    Draw,
}

/// Decide a match from its weighted vote totals.
///
/// A weighted tie is a draw in the group stage; in knockout phases a draw
/// is not representable, so the tie falls back to the raw counts and then
/// to restaurant1.
pub fn decide_winner(
    restaurant1_id: i64,
    restaurant2_id: i64,
    weighted1: f64,
    weighted2: f64,
    votes1: i64,
    votes2: i64,
    knockout: bool,
) -> MatchDecision {
    if weighted1 > weighted2 {
        return MatchDecision::Winner(restaurant1_id);
    }
    if weighted2 > weighted1 {
        return MatchDecision::Winner(restaurant2_id);
    }

    if !knockout {
        return MatchDecision::Draw;
    }

    if votes1 >= votes2 {
        MatchDecision::Winner(restaurant1_id)
    } else {
        MatchDecision::Winner(restaurant2_id)
    }
}
