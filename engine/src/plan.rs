//! Drip-schedule generator.
//!
//! A prize with `prize_num` units and a delivery period of `days` gets a
//! schedule of minute-aligned `(time, quantity)` slots covering
//! `[now, now + days * 86400)` whose quantities sum to exactly `prize_num`.
//! Days share the load evenly; hours inside a day follow the operator's
//! weight table; minutes inside an hour are uniform.

use rand::Rng;

use repo::model::PlanSlot;

/// 100 tokens mapping onto hours of the day. An hour appearing more often
/// receives a proportionally larger share; mid-morning and the evening
/// carry extra weight per operator choice.
pub const HOURLY_WEIGHTS: [usize; 100] = [
    0, 0, 0, //
    1, 1, 1, //
    2, 2, 2, //
    3, 3, 3, //
    4, 4, 4, //
    5, 5, 5, //
    6, 6, 6, //
    7, 7, 7, //
    8, 8, 8, 8, 8, 8, 8, //
    9, 9, 9, //
    10, 10, 10, //
    11, 11, 11, //
    12, 12, 12, //
    13, 13, 13, //
    14, 14, 14, 14, 14, 14, 14, //
    15, 15, 15, 15, 15, 15, 15, //
    16, 16, 16, 16, 16, 16, 16, //
    17, 17, 17, 17, 17, 17, 17, //
    18, 18, 18, //
    19, 19, 19, //
    20, 20, 20, 20, 20, 20, 20, //
    21, 21, 21, 21, 21, 21, 21, //
    22, 22, 22, //
    23, 23, 23, //
];

/// Build the schedule. `now_hour` is the wall-clock hour at plan start; the
/// hour weighting stays aligned to the wall clock while slot offsets count
/// from `now`. Slots come out ordered by timestamp with zero-quantity slots
/// dropped.
pub fn build_plan(
    prize_num: i64,
    days: u32,
    now: i64,
    now_hour: u32,
    rng: &mut impl Rng,
) -> Vec<PlanSlot> {
    if prize_num <= 0 || days == 0 {
        return Vec::new();
    }

    // Floor-average across days, remainder scattered uniformly.
    let day_count = days as usize;
    let avg = prize_num / days as i64;
    let mut per_day = vec![avg; day_count];
    let mut rest = prize_num - avg * days as i64;
    while rest > 0 {
        rest -= 1;
        per_day[rng.gen_range(0..day_count)] += 1;
    }

    let mut slots = Vec::new();
    for (day, &n) in per_day.iter().enumerate() {
        if n <= 0 {
            continue;
        }
        let day_plan = plan_one_day(n, rng);
        let day_start = now + day as i64 * 86_400;

        for offset_hour in 0..24usize {
            let weight_hour = (offset_hour + now_hour as usize) % 24;
            let hour_start = day_start + offset_hour as i64 * 3_600;
            for (minute, &num) in day_plan[weight_hour].iter().enumerate() {
                if num <= 0 {
                    continue;
                }
                slots.push(PlanSlot {
                    time: hour_start + minute as i64 * 60,
                    num,
                });
            }
        }
    }
    slots
}

/// Split one day's quantity over 24 hours by the weight table, then over 60
/// minutes. Bulk shares go out by floor division first; the remainder is
/// scattered one token at a time.
fn plan_one_day(total: i64, rng: &mut impl Rng) -> [[i64; 60]; 24] {
    let mut hours = [0i64; 24];
    let mut remaining = total;

    if total > 100 {
        let mut weight = [0i64; 24];
        for &h in HOURLY_WEIGHTS.iter() {
            weight[h] += 1;
        }
        for h in 0..24 {
            let share = total * weight[h] / 100;
            hours[h] = share;
            remaining -= share;
        }
    }
    while remaining > 0 {
        remaining -= 1;
        hours[HOURLY_WEIGHTS[rng.gen_range(0..100)]] += 1;
    }

    let mut out = [[0i64; 60]; 24];
    for h in 0..24 {
        let mut left = hours[h];
        if left <= 0 {
            continue;
        }
        if left >= 60 {
            let avg = left / 60;
            for m in 0..60 {
                out[h][m] = avg;
            }
            left -= avg * 60;
        }
        while left > 0 {
            left -= 1;
            out[h][rng.gen_range(0..60)] += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const NOW: i64 = 1_656_120_000; // some fixed minute-aligned instant

    fn plan(prize_num: i64, days: u32, seed: u64) -> Vec<PlanSlot> {
        let mut rng = StdRng::seed_from_u64(seed);
        build_plan(prize_num, days, NOW, 10, &mut rng)
    }

    #[test]
    fn quantities_sum_to_prize_num() {
        for (num, days) in [(1, 1), (10, 1), (59, 2), (60, 1), (250, 3), (10_000, 7)] {
            let slots = plan(num, days, 42);
            let total: i64 = slots.iter().map(|s| s.num).sum();
            assert_eq!(total, num, "num={num} days={days}");
        }
    }

    #[test]
    fn slots_stay_inside_the_window_and_are_ordered() {
        let days = 3u32;
        let slots = plan(500, days, 7);
        let end = NOW + days as i64 * 86_400;

        assert!(!slots.is_empty());
        for s in &slots {
            assert!(s.time >= NOW && s.time < end);
            assert_eq!((s.time - NOW) % 60, 0, "slot not minute-aligned");
            assert!(s.num > 0);
        }
        for pair in slots.windows(2) {
            assert!(pair[0].time < pair[1].time);
        }
    }

    #[test]
    fn zero_inputs_yield_empty_plans() {
        assert!(plan(0, 3, 1).is_empty());
        assert!(plan(10, 0, 1).is_empty());
    }

    #[test]
    fn plan_roundtrips_through_the_serialized_column() {
        let slots = plan(77, 2, 3);
        let json = serde_json::to_string(&slots).unwrap();
        assert_eq!(PlanSlot::parse_list(&json).unwrap(), slots);
        assert!(PlanSlot::parse_list("").unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn plan_sum_invariant(num in 1i64..5_000, days in 1u32..10, seed in any::<u64>()) {
            let slots = plan(num, days, seed);
            let total: i64 = slots.iter().map(|s| s.num).sum();
            prop_assert_eq!(total, num);
        }
    }
}
