//! Pure reward math: boost composition, effective APY, period projections,
//! and calendar-aligned claim timing. No I/O anywhere in this module; raw
//! integer values stay available next to every float convenience so a
//! presentation layer can format losslessly.

use alloy_primitives::U256;

/// Lossy conversion for display math. Values beyond f64 range saturate to
/// infinity, which downstream `is_finite` guards turn into "no figure".
pub fn u256_to_f64(v: U256) -> f64 {
    v.to_string().parse().unwrap_or(f64::INFINITY)
}

/// Token amount scaled down by the ERC20 decimals, as a lossy f64.
pub fn format_units(amount: U256, decimals: u8) -> f64 {
    u256_to_f64(amount) / 10f64.powi(decimals as i32)
}

pub fn bps_to_pct(bps: u64) -> f64 {
    bps as f64 / 100.0
}

/// USD figure for a token amount, `None` when no price is available or the
/// product is not representable. Callers render a placeholder for `None`,
/// never zero.
pub fn usd_value(tokens: f64, price_usd: Option<f64>) -> Option<f64> {
    let usd = tokens * price_usd?;
    usd.is_finite().then_some(usd)
}

/// Compose the NFT boost from held tiers.
///
/// Only the highest held tier contributes its bonus (tiers never sum), and
/// the all-tiers bonus activates only when tiers 1 through 6 are all held
/// simultaneously. The combined bonus is capped at the configured maximum
/// regardless of how it was composed.
pub fn compose_boost_bps(
    tiers_held: &[u8],
    tier_bonus_bps: &[u16; 6],
    all_tiers_bonus_bps: u16,
    max_total_boost_bps: u16,
) -> u16 {
    let highest = tiers_held
        .iter()
        .copied()
        .filter(|t| (1..=6).contains(t))
        .max()
        .unwrap_or(0);
    let highest_bonus = if highest == 0 {
        0
    } else {
        tier_bonus_bps[highest as usize - 1]
    };
    let has_all_six = (1u8..=6).all(|t| tiers_held.contains(&t));
    let uncapped = highest_bonus as u32 + if has_all_six { all_tiers_bonus_bps as u32 } else { 0 };
    uncapped.min(max_total_boost_bps as u32) as u16
}

/// Base plan APY plus capped boost, as a percentage.
pub fn effective_apy_pct(plan_apy_bps: u16, boost_bps: u16) -> f64 {
    bps_to_pct(plan_apy_bps as u64 + boost_bps as u64)
}

const YEAR_DAYS: f64 = 365.0;
const MONTH_DAYS: f64 = 30.0;
const WEEK_DAYS: f64 = 7.0;

/// Projected token emissions for one principal at one effective APY.
/// Sub-year periods are pro-rata slices of the yearly figure (365-day year,
/// 30-day month, 7-day week) with no compounding inside a period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardProjection {
    pub yearly: f64,
    pub monthly: f64,
    pub weekly: f64,
    pub daily: f64,
}

impl RewardProjection {
    pub fn for_amount(principal: f64, apy_pct: f64) -> Self {
        let yearly = principal * apy_pct / 100.0;
        Self {
            yearly,
            monthly: yearly * MONTH_DAYS / YEAR_DAYS,
            weekly: yearly * WEEK_DAYS / YEAR_DAYS,
            daily: yearly / YEAR_DAYS,
        }
    }
}

/// Whole claim windows elapsed since the last claim.
pub fn elapsed_whole_months(last_claim_time: u64, now: u64, month_seconds: u64) -> u64 {
    if now <= last_claim_time || month_seconds == 0 {
        return 0;
    }
    (now - last_claim_time) / month_seconds
}

/// Start of the next claim window after `now`.
pub fn next_claim_time(last_claim_time: u64, now: u64, month_seconds: u64) -> u64 {
    last_claim_time + (elapsed_whole_months(last_claim_time, now, month_seconds) + 1) * month_seconds
}

/// A position is claimable when the contract reports at least one whole
/// month and claiming is not globally paused.
pub fn is_claimable(claimable_months: u64, claim_paused: bool) -> bool {
    !claim_paused && claimable_months > 0
}

/// Moment the position unlocks without penalty.
pub fn unlock_time(start_time: u64, duration_seconds: u64) -> u64 {
    start_time.saturating_add(duration_seconds)
}

pub fn is_matured(start_time: u64, duration_seconds: u64, now: u64) -> bool {
    now >= unlock_time(start_time, duration_seconds)
}

/// Penalty withheld on a pre-maturity (emergency) exit.
pub fn penalty_amount(amount: U256, early_exit_penalty_bps: u16) -> U256 {
    amount * U256::from(early_exit_penalty_bps) / U256::from(10_000u64)
}

/// Human-readable countdown to the next claim window, shown only while the
/// position is not yet claimable and the next window still falls before
/// the unlock date.
pub fn next_claim_countdown(
    last_claim_time: u64,
    start_time: u64,
    duration_seconds: u64,
    now: u64,
    month_seconds: u64,
) -> Option<String> {
    let unlock = unlock_time(start_time, duration_seconds);
    if now >= unlock {
        return None;
    }
    let next = next_claim_time(last_claim_time, now, month_seconds);
    if next > now && next <= unlock {
        Some(format_duration_short(next - now))
    } else {
        None
    }
}

/// "3d 7h" / "2h 5m" / "12m" style short durations.
pub fn format_duration_short(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    if days > 0 {
        return format!("{}d {}h", days, hours);
    }
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        return format!("{}h {}m", hours, minutes);
    }
    format!("{}m", minutes)
}

/// Convert a unix timestamp to a human-readable date/time.
pub fn format_timestamp(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIER_BONUS: [u16; 6] = [100, 200, 300, 400, 500, 600];

    #[test]
    fn boost_uses_highest_tier_only() {
        let bps = compose_boost_bps(&[2, 5], &TIER_BONUS, 250, 10_000);
        assert_eq!(bps, 500); // tier 5 bonus alone, never 200 + 500
    }

    #[test]
    fn all_six_tiers_add_the_all_tiers_bonus() {
        let bps = compose_boost_bps(&[1, 2, 3, 4, 5, 6], &TIER_BONUS, 250, 10_000);
        assert_eq!(bps, 600 + 250);
    }

    #[test]
    fn boost_is_capped_at_the_configured_maximum() {
        let bps = compose_boost_bps(&[1, 2, 3, 4, 5, 6], &TIER_BONUS, 250, 700);
        assert_eq!(bps, 700);
    }

    #[test]
    fn five_of_six_tiers_get_no_all_tiers_bonus() {
        let bps = compose_boost_bps(&[1, 2, 3, 4, 5], &TIER_BONUS, 250, 10_000);
        assert_eq!(bps, 500);
    }

    #[test]
    fn no_tiers_means_no_boost() {
        assert_eq!(compose_boost_bps(&[], &TIER_BONUS, 250, 10_000), 0);
        // Out-of-range tier identifiers are ignored.
        assert_eq!(compose_boost_bps(&[0, 7], &TIER_BONUS, 250, 10_000), 0);
    }

    #[test]
    fn projection_is_pro_rata_without_compounding() {
        let p = RewardProjection::for_amount(1000.0, 6.0);
        assert!((p.yearly - 60.0).abs() < 1e-9);
        assert!((p.monthly - 60.0 * 30.0 / 365.0).abs() < 1e-9);
        assert!((p.monthly - 4.9315).abs() < 1e-3);
        assert!((p.weekly - 60.0 * 7.0 / 365.0).abs() < 1e-9);
        assert!((p.daily - 60.0 / 365.0).abs() < 1e-9);
        // Twelve 30-day months under-run the yearly figure: no compounding.
        assert!(p.monthly * 12.0 < p.yearly);
    }

    #[test]
    fn effective_apy_adds_boost_in_bps() {
        assert!((effective_apy_pct(600, 250) - 8.5).abs() < 1e-9);
    }

    #[test]
    fn claim_window_math_matches_the_45_day_example() {
        let t = 1_700_000_000u64;
        let month = 30 * 86400;
        let now = t + 45 * 86400;
        assert_eq!(elapsed_whole_months(t, now, month), 1);
        assert_eq!(next_claim_time(t, now, month), t + 60 * 86400);
    }

    #[test]
    fn claimability_requires_months_and_unpaused() {
        assert!(is_claimable(1, false));
        assert!(!is_claimable(0, false));
        assert!(!is_claimable(3, true));
    }

    #[test]
    fn countdown_only_shows_before_unlock() {
        let start = 1_700_000_000u64;
        let month = 30 * 86400;
        let duration = 90 * 86400;
        let now = start + 10 * 86400;
        let label = next_claim_countdown(start, start, duration, now, month).unwrap();
        assert_eq!(label, "20d 0h");
        // Past maturity there is nothing to count down to.
        let past = start + duration;
        assert_eq!(next_claim_countdown(start, start, duration, past, month), None);
    }

    #[test]
    fn penalty_is_basis_points_of_the_amount() {
        let amount = U256::from(10_000u64) * U256::from(10u64).pow(U256::from(18u64));
        let penalty = penalty_amount(amount, 500);
        assert_eq!(penalty, U256::from(500u64) * U256::from(10u64).pow(U256::from(18u64)));
    }

    #[test]
    fn format_units_scales_by_decimals() {
        let amount = U256::from(1_500_000_000_000_000_000u128);
        assert!((format_units(amount, 18) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn usd_value_propagates_absence() {
        assert_eq!(usd_value(10.0, None), None);
        assert_eq!(usd_value(10.0, Some(2.5)), Some(25.0));
        assert_eq!(usd_value(10.0, Some(f64::INFINITY)), None);
    }

    #[test]
    fn short_durations_pick_the_right_granularity() {
        assert_eq!(format_duration_short(3 * 86400 + 7 * 3600), "3d 7h");
        assert_eq!(format_duration_short(2 * 3600 + 300), "2h 5m");
        assert_eq!(format_duration_short(720), "12m");
    }
}
