//! Leave-day accounting for vacation requests
use std::fmt;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayKind {
    #[n(0)]
    Full,
    #[n(1)]
    Half,
    /// Authorised absence, costs nothing.
    #[n(2)]
    Authorized,
    #[n(3)]
    Unpaid,
}

impl DayKind {
    pub fn cost(self) -> LeaveDays {
        match self {
            DayKind::Full => LeaveDays::from_half_days(2),
            DayKind::Half => LeaveDays::from_half_days(1),
            DayKind::Authorized | DayKind::Unpaid => LeaveDays::ZERO,
        }
    }
}

/// A day count with half-day resolution, stored as a number of half days so
/// that sums are exact.
#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord,
)]
pub struct LeaveDays(#[n(0)] i64);

impl LeaveDays {
    pub const ZERO: LeaveDays = LeaveDays(0);

    pub fn from_half_days(half_days: i64) -> Self {
        Self(half_days)
    }
    pub fn whole(days: i64) -> Self {
        Self(days * 2)
    }
    /// Accepts only non-negative multiples of 0.5.
    pub fn from_days(days: f64) -> Option<Self> {
        let half_days = days * 2.0;
        if !half_days.is_finite() || half_days < 0.0 || half_days.fract() != 0.0 {
            return None;
        }
        Some(Self(half_days as i64))
    }
    pub fn half_days(self) -> i64 {
        self.0
    }
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 2.0
    }
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl std::ops::Add for LeaveDays {
    type Output = LeaveDays;
    fn add(self, rhs: LeaveDays) -> LeaveDays {
        LeaveDays(self.0 + rhs.0)
    }
}

impl std::ops::Sub for LeaveDays {
    type Output = LeaveDays;
    fn sub(self, rhs: LeaveDays) -> LeaveDays {
        LeaveDays(self.0 - rhs.0)
    }
}

impl std::iter::Sum for LeaveDays {
    fn sum<I: Iterator<Item = LeaveDays>>(iter: I) -> Self {
        iter.fold(LeaveDays::ZERO, |acc, d| acc + d)
    }
}

impl fmt::Display for LeaveDays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.abs();
        if abs % 2 == 0 {
            write!(f, "{sign}{}", abs / 2)
        } else {
            write!(f, "{sign}{}.5", abs / 2)
        }
    }
}

/// Total cost of a leave request: full = 1, half = 0.5, zero-cost = 0.
pub fn deduction<'a>(days: impl IntoIterator<Item = &'a DayKind>) -> LeaveDays {
    days.into_iter().map(|kind| kind.cost()).sum()
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct VacationBalance {
    #[n(0)]
    pub employee_id: String,
    #[n(1)]
    pub remaining: LeaveDays,
    #[n(2)]
    pub used: LeaveDays,
}

impl VacationBalance {
    pub fn new(employee_id: String, remaining: LeaveDays) -> Self {
        Self {
            employee_id,
            remaining,
            used: LeaveDays::ZERO,
        }
    }

    /// Moves `amount` from remaining to used.
    pub fn apply(&mut self, amount: LeaveDays) {
        self.remaining = self.remaining - amount;
        self.used = self.used + amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_day_kinds_sum_exactly() {
        let days = [DayKind::Full, DayKind::Half, DayKind::Authorized];
        let total = deduction(&days);

        assert_eq!(total, LeaveDays::from_half_days(3));
        assert_eq!(total.as_f64(), 1.5);
        assert_eq!(total.to_string(), "1.5");
    }

    #[test]
    fn apply_moves_days_to_used() {
        let mut balance = VacationBalance::new("emp".into(), LeaveDays::whole(10));
        balance.apply(LeaveDays::from_half_days(3));

        assert_eq!(balance.remaining.to_string(), "8.5");
        assert_eq!(balance.used.to_string(), "1.5");
    }

    #[test]
    fn from_days_rejects_quarter_days() {
        assert_eq!(LeaveDays::from_days(2.5), Some(LeaveDays::from_half_days(5)));
        assert_eq!(LeaveDays::from_days(2.25), None);
        assert_eq!(LeaveDays::from_days(-1.0), None);
    }

    #[test]
    fn negative_display() {
        assert_eq!(LeaveDays::from_half_days(-3).to_string(), "-1.5");
    }
}
