use crate::data::{self, HOURS_PER_YEAR, MWH_PER_TWH};

/// How a carrier's availability varies over the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierCategory {
    Dispatchable,
    SolarLike,
    WindLike,
}

/// Carriers with a diurnal availability shape. Anything else is
/// dispatchable.
const VARIABLE_CARRIERS: [(&str, CarrierCategory); 4] = [
    ("solar", CarrierCategory::SolarLike),
    ("wind", CarrierCategory::WindLike),
    ("onwind", CarrierCategory::WindLike),
    ("offwind", CarrierCategory::WindLike),
];

impl CarrierCategory {
    pub fn of(carrier: &str) -> Self {
        VARIABLE_CARRIERS
            .iter()
            .find(|(name, _)| *name == carrier)
            .map(|(_, category)| *category)
            .unwrap_or(Self::Dispatchable)
    }

    /// The 24-point shape for variable categories.
    pub fn diurnal_shape(&self) -> Option<&'static [f64; 24]> {
        match self {
            Self::Dispatchable => None,
            Self::SolarLike => Some(&data::SOLAR_PROFILE),
            Self::WindLike => Some(&data::WIND_PROFILE),
        }
    }
}

/// Per-unit upper bound on dispatch, `p_max_pu`.
#[derive(Debug, Clone, PartialEq)]
pub enum Availability {
    Constant(f64),
    Profile(Vec<f64>),
}

impl Availability {
    pub fn at(&self, snapshot: usize) -> f64 {
        match self {
            Self::Constant(value) => *value,
            Self::Profile(values) => values[snapshot],
        }
    }

    pub fn to_vec(&self, n_snapshots: usize) -> Vec<f64> {
        match self {
            Self::Constant(value) => vec![*value; n_snapshots],
            Self::Profile(values) => values.clone(),
        }
    }
}

/// Repeats `shape` forward and cuts it to exactly `n` points.
pub fn tile(shape: &[f64], n: usize) -> Vec<f64> {
    shape.iter().copied().cycle().take(n).collect()
}

/// Availability of `carrier` over `n_snapshots` hours. Variable carriers
/// repeat the same day, with no day-to-day variation.
pub fn availability(carrier: &str, n_snapshots: usize) -> Availability {
    match CarrierCategory::of(carrier).diurnal_shape() {
        Some(shape) => Availability::Profile(tile(shape, n_snapshots)),
        None => Availability::Constant(1.0),
    }
}

/// Hourly demand (MW) built by tiling the typical day, scaled so that a
/// full year sums to `annual_demand_twh`.
pub fn synthetic_demand(
    annual_demand_twh: f64,
    n_snapshots: usize,
) -> Vec<f64> {
    let days = (HOURS_PER_YEAR / 24) as f64;
    let shape_sum: f64 = data::LOAD_PROFILE.iter().sum();
    let scale = annual_demand_twh * MWH_PER_TWH / (days * shape_sum);
    tile(&data::LOAD_PROFILE, n_snapshots)
        .into_iter()
        .map(|f| f * scale)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solar_is_truncated_within_a_day() {
        let solar = availability("solar", 6);
        assert_eq!(
            solar,
            Availability::Profile(data::SOLAR_PROFILE[..6].to_vec())
        );
    }

    #[test]
    fn test_solar_wraps_after_a_day() {
        let solar = availability("solar", 30).to_vec(30);
        assert_eq!(solar.len(), 30);
        assert_eq!(&solar[..24], &data::SOLAR_PROFILE[..]);
        assert_eq!(&solar[24..], &data::SOLAR_PROFILE[..6]);
    }

    #[test]
    fn test_wind_variants_share_the_wind_shape() {
        for carrier in ["wind", "onwind", "offwind"] {
            assert_eq!(CarrierCategory::of(carrier), CarrierCategory::WindLike);
            assert_eq!(
                availability(carrier, 24).to_vec(24),
                data::WIND_PROFILE.to_vec()
            );
        }
    }

    #[test]
    fn test_dispatchable_carriers_are_always_available() {
        let coal = availability("coal", 8760);
        assert_eq!(coal, Availability::Constant(1.0));
        assert_eq!(coal.at(8759), 1.0);
        assert_eq!(
            CarrierCategory::of("import_hydro"),
            CarrierCategory::Dispatchable
        );
    }

    #[test]
    fn test_availability_is_deterministic() {
        assert_eq!(availability("wind", 100), availability("wind", 100));
    }

    #[test]
    fn test_synthetic_demand_sums_to_annual_total() {
        let demand = synthetic_demand(800.0, HOURS_PER_YEAR);
        assert_eq!(demand.len(), HOURS_PER_YEAR);
        assert_relative_eq!(
            demand.iter().sum::<f64>(),
            800.0e6,
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_synthetic_demand_repeats_daily() {
        let demand = synthetic_demand(800.0, 48);
        assert_eq!(&demand[..24], &demand[24..]);
        let peak = demand.iter().cloned().fold(f64::MIN, f64::max);
        assert_relative_eq!(demand[11], peak);
    }
}
