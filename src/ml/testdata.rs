//! Synthetic cohorts for unit tests

use crate::structs::PatientRecord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Box-Muller normal draw
pub fn normal(rng: &mut StdRng, mean: f64, sd: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    mean + sd * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Cohort where systolic pressure and age separate the labels strongly.
///
/// Labels alternate so both classes are equally represented.
pub fn separable_cohort(n: usize, seed: u64) -> Vec<PatientRecord> {
    let mut rng = rng(seed);
    (0..n)
        .map(|i| {
            let sick = i % 2 == 0;
            let shift = if sick { 1.0 } else { 0.0 };
            let ap_hi = normal(&mut rng, 30.0f64.mul_add(shift, 120.0), 8.0).round();
            PatientRecord {
                id: Some(i64::try_from(i).unwrap_or(i64::MAX)),
                age_years: Some(normal(&mut rng, 10.0f64.mul_add(shift, 48.0), 6.0).round()),
                gender: Some(if rng.gen_bool(0.5) { 1.0 } else { 2.0 }),
                height: Some(normal(&mut rng, 168.0, 8.0).round()),
                weight: Some(normal(&mut rng, 5.0f64.mul_add(shift, 72.0), 10.0).round()),
                ap_hi: Some(ap_hi),
                ap_lo: Some(normal(&mut rng, 80.0, 7.0).round()),
                cholesterol: Some(f64::from(rng.gen_range(1u8..=3))),
                gluc: Some(f64::from(rng.gen_range(1u8..=3))),
                smoke: Some(if rng.gen_bool(0.1) { 1.0 } else { 0.0 }),
                cardio: Some(shift),
                ..PatientRecord::default()
            }
        })
        .collect()
}

/// Three well-separated patient profiles with distinct disease prevalence
/// (10%, 50% and 90%).
pub fn three_blobs(per_blob: usize, seed: u64) -> Vec<PatientRecord> {
    // age, weight, height, ap_hi, ap_lo, prevalence per ten
    let centers = [
        (32.0, 58.0, 160.0, 105.0, 68.0, 1),
        (50.0, 85.0, 172.0, 140.0, 90.0, 5),
        (66.0, 115.0, 182.0, 185.0, 115.0, 9),
    ];
    let mut rng = rng(seed);
    let mut records = Vec::with_capacity(per_blob * centers.len());

    for (age, weight, height, ap_hi, ap_lo, per_ten) in centers {
        for i in 0..per_blob {
            records.push(PatientRecord {
                age_years: Some(normal(&mut rng, age, 1.5)),
                weight: Some(normal(&mut rng, weight, 2.0)),
                height: Some(normal(&mut rng, height, 2.0)),
                ap_hi: Some(normal(&mut rng, ap_hi, 3.0)),
                ap_lo: Some(normal(&mut rng, ap_lo, 2.0)),
                cardio: Some(if i % 10 < per_ten { 1.0 } else { 0.0 }),
                ..PatientRecord::default()
            });
        }
    }
    records
}
