//! Built-in catalogs for the supported product families
//!
//! - `ALD_U_N_1A` and `ALD_U_N_1B`: observations with nested measurements
//! - `ALD_U_N_2B` and `ALD_U_N_2C`: groupings, profiles, wind results and
//!   L1B measurements connected through index maps
//! - `AUX_ISR_1B`, `AUX_MRC_1B`, `AUX_RRC_1B` and `AUX_ZWC_1B`: one level
//!   of calibration data set records each
//! - `AUX_MET_12`: meteorological profiles along the off-nadir and nadir
//!   tracks
//!
//! Catalogs are plain data; they are rebuilt on every call.

use super::{FieldCatalog, FieldDef, LevelDef};
use crate::error::{Error, Result};
use crate::location::{AlbedoSample, ChannelSum, FirstReferenced, HorizontalWind, WindComponent};

/// Product type of Level 1A raw measurement products
pub const LEVEL_1A: &str = "ALD_U_N_1A";
/// Product type of Level 1B wind products
pub const LEVEL_1B: &str = "ALD_U_N_1B";
/// Product type of Level 2B wind products
pub const LEVEL_2B: &str = "ALD_U_N_2B";
/// Product type of Level 2C wind products
pub const LEVEL_2C: &str = "ALD_U_N_2C";
/// Product type of instrument spectral registration calibrations
pub const AUX_ISR: &str = "AUX_ISR_1B";
/// Product type of Mie response calibrations
pub const AUX_MRC: &str = "AUX_MRC_1B";
/// Product type of Rayleigh response calibrations
pub const AUX_RRC: &str = "AUX_RRC_1B";
/// Product type of zero wind calibrations
pub const AUX_ZWC: &str = "AUX_ZWC_1B";
/// Product type of auxiliary meteorological products
pub const AUX_MET: &str = "AUX_MET_12";

const SENSING_START: &str = "mph/sensing_start";
const SENSING_STOP: &str = "mph/sensing_stop";

/// Every product type with a built-in catalog
pub fn supported_product_types() -> &'static [&'static str] {
    &[LEVEL_1A, LEVEL_1B, LEVEL_2B, LEVEL_2C, AUX_ISR, AUX_MRC, AUX_RRC, AUX_ZWC, AUX_MET]
}

/// Built-in catalog for `product_type`
pub fn for_product_type(product_type: &str) -> Result<FieldCatalog> {
    match product_type {
        LEVEL_1A => level_1a(),
        LEVEL_1B => level_1b(),
        LEVEL_2B => level_2b(),
        LEVEL_2C => level_2c(),
        AUX_ISR => aux_isr(),
        AUX_MRC => aux_mrc(),
        AUX_RRC => aux_rrc(),
        AUX_ZWC => aux_zwc(),
        AUX_MET => aux_met(),
        other => Err(Error::UnsupportedProduct(other.to_string())),
    }
}

fn path(name: &str, location: &str) -> FieldDef {
    FieldDef::new(name, location)
}

// =============================================================================
// Level 1A
// =============================================================================

/// Catalog of `ALD_U_N_1A`
///
/// Same record layout and overlap rule as Level 1B, without wind results.
pub fn level_1a() -> Result<FieldCatalog> {
    let obs = |name: &str, leaf: &str| path(name, &format!("geolocation/*/{}", leaf));
    let obs_bins = |receiver: &str, suffix: &str, leaf: &str| {
        path(
            &format!("{}_{}", receiver, suffix),
            &format!(
                "geolocation/*/observation_geolocation/observation_{}_geolocation/*/{}",
                receiver, leaf
            ),
        )
        .array()
    };
    let dem = "observation_geolocation/geolocation_of_dem_intersection";

    let mut observation = LevelDef::new("observation")
        .records_at("geolocation")
        .field(obs("time", "observation_aocs/observation_centroid_time"));
    for receiver in ["mie", "rayleigh"] {
        observation = observation
            .field(obs_bins(receiver, "longitude", "longitude_of_height_bin"))
            .field(obs_bins(receiver, "latitude", "latitude_of_height_bin"))
            .field(obs_bins(receiver, "altitude", "altitude_of_height_bin"))
            .field(obs_bins(receiver, "range", "satellite_range_of_height_bin"))
            .field(obs_bins(
                receiver,
                "topocentric_azimuth_of_height_bin",
                "topocentric_azimuth_of_height_bin",
            ))
            .field(obs_bins(
                receiver,
                "topocentric_elevation_of_height_bin",
                "topocentric_elevation_of_height_bin",
            ))
            .field(obs_bins(
                receiver,
                "target_to_sun_visibility_flag",
                "target_to_sun_visibility_flag",
            ));
    }
    let observation = observation
        .field(obs("latitude_of_DEM_intersection", &format!("{}/latitude_of_dem_intersection", dem)))
        .field(obs("longitude_of_DEM_intersection", &format!("{}/longitude_of_dem_intersection", dem)))
        .field(obs("altitude_of_DEM_intersection", &format!("{}/altitude_of_dem_intersection", dem)))
        .field(obs(
            "argument_of_latitude_of_dem_intersection",
            &format!("{}/argument_of_latitude_of_dem_intersection", dem),
        ))
        .field(obs("sun_elevation_angle", &format!("{}/sun_elevation_at_dem_intersection", dem)))
        .field(obs("velocity_at_DEM_intersection", "observation_geolocation/line_of_sight_velocity"))
        .field(obs("geoid_separation", "observation_geolocation/geoid_separation"))
        .field(obs("AOCS_roll_angle", "observation_aocs/roll_angle"))
        .field(obs("AOCS_pitch_angle", "observation_aocs/pitch_angle"))
        .field(obs("AOCS_yaw_angle", "observation_aocs/yaw_angle"));

    let meas = |suffix: &str, leaf: &str| {
        path(&format!("measurement_{}", suffix), &format!("geolocation/*/{}", leaf))
    };
    // the product spells the per-measurement range leaf "sattelite"
    let meas_bins = |receiver: &str, suffix: &str, leaf: &str| {
        path(
            &format!("measurement_{}_{}", receiver, suffix),
            &format!("geolocation/*/measurement_geolocation/*/{}_geolocation/*/{}", receiver, leaf),
        )
        .array()
    };
    let meas_dem = "measurement_geolocation/*/geolocation_of_dem_intersection";

    let mut measurement = LevelDef::new("measurement")
        .nested_in("observation")
        .field(meas("time", "measurement_aocs/*/measurement_centroid_time"))
        .field(meas("AOCS_roll_angle", "measurement_aocs/*/roll_angle"))
        .field(meas("AOCS_pitch_angle", "measurement_aocs/*/pitch_angle"))
        .field(meas("AOCS_yaw_angle", "measurement_aocs/*/yaw_angle"));
    for receiver in ["mie", "rayleigh"] {
        measurement = measurement
            .field(meas_bins(receiver, "longitude", "longitude_of_height_bin"))
            .field(meas_bins(receiver, "latitude", "latitude_of_height_bin"))
            .field(meas_bins(receiver, "altitude", "altitude_of_height_bin"))
            .field(meas_bins(receiver, "range", "sattelite_range_of_height_bin"));
    }
    let measurement = measurement
        .field(meas(
            "latitude_of_DEM_intersection",
            &format!("{}/latitude_of_dem_intersection", meas_dem),
        ))
        .field(meas(
            "longitude_of_DEM_intersection",
            &format!("{}/longitude_of_dem_intersection", meas_dem),
        ))
        .field(meas(
            "altitude_of_DEM_intersection",
            &format!("{}/altitude_of_dem_intersection", meas_dem),
        ))
        .field(meas(
            "argument_of_latitude_of_dem_intersection",
            &format!("{}/argument_of_latitude_of_dem_intersection", meas_dem),
        ))
        .field(meas(
            "sun_elevation_angle",
            &format!("{}/sun_elevation_at_dem_intersection", meas_dem),
        ))
        .field(meas(
            "velocity_at_DEM_intersection",
            "measurement_geolocation/*/aocs_los_velocity",
        ))
        .field(path("mie_measurement_data", "mie_measurement/*/mie_measurement_data").array())
        .field(path("rayleigh_measurement_data", "rayleigh_measurement/*/rayleigh_measurement_data").array());

    FieldCatalog::builder(LEVEL_1A)
        .level(observation)
        .level(measurement)
        .overlap(
            "geolocation/*/measurement_aocs/*/measurement_centroid_time",
            &["time"],
        )
        .build()
}

// =============================================================================
// Level 1B
// =============================================================================

/// Catalog of `ALD_U_N_1B`
///
/// Measurements are nested per observation. Consecutive files overlap by a
/// few observations; the overlap is detected on measurement times.
pub fn level_1b() -> Result<FieldCatalog> {
    let observation = LevelDef::new("observation")
        .records_at("geolocation")
        .field(path("time", "geolocation/*/observation_aocs/observation_centroid_time"))
        .field(path(
            "longitude_of_DEM_intersection",
            "geolocation/*/observation_geolocation/geolocation_of_dem_intersection/longitude_of_dem_intersection",
        ))
        .field(path(
            "latitude_of_DEM_intersection",
            "geolocation/*/observation_geolocation/geolocation_of_dem_intersection/latitude_of_dem_intersection",
        ))
        .field(path(
            "altitude_of_DEM_intersection",
            "geolocation/*/observation_geolocation/geolocation_of_dem_intersection/altitude_of_dem_intersection",
        ))
        .field(
            path(
                "mie_altitude",
                "geolocation/*/observation_geolocation/observation_mie_geolocation/*/altitude_of_height_bin",
            )
            .array(),
        )
        .field(
            path(
                "rayleigh_altitude",
                "geolocation/*/observation_geolocation/observation_rayleigh_geolocation/*/altitude_of_height_bin",
            )
            .array(),
        )
        .field(path("geoid_separation", "geolocation/*/observation_geolocation/geoid_separation"))
        .field(path(
            "velocity_at_DEM_intersection",
            "geolocation/*/observation_geolocation/line_of_sight_velocity",
        ))
        .field(path("AOCS_pitch_angle", "geolocation/*/observation_aocs/pitch_angle"))
        .field(path("AOCS_roll_angle", "geolocation/*/observation_aocs/roll_angle"))
        .field(path("AOCS_yaw_angle", "geolocation/*/observation_aocs/yaw_angle"))
        .field(
            path(
                "mie_HLOS_wind_speed",
                "wind_velocity/*/observation_wind_profile/mie_altitude_bin_wind_info/*/wind_velocity",
            )
            .array(),
        )
        .field(
            path(
                "rayleigh_HLOS_wind_speed",
                "wind_velocity/*/observation_wind_profile/rayleigh_altitude_bin_wind_info/*/wind_velocity",
            )
            .array(),
        )
        .field(
            path(
                "mie_signal_intensity",
                "useful_signal/*/observation_useful_signals/mie_altitude_bin_useful_signal_info/*/useful_signal",
            )
            .array(),
        )
        .field(
            path(
                "rayleigh_signal_channel_A_intensity",
                "useful_signal/*/observation_useful_signals/rayleigh_altitude_bin_useful_signal_info/*/useful_signal_channel_a",
            )
            .array(),
        )
        .field(
            path(
                "rayleigh_signal_channel_B_intensity",
                "useful_signal/*/observation_useful_signals/rayleigh_altitude_bin_useful_signal_info/*/useful_signal_channel_b",
            )
            .array(),
        )
        .field(
            FieldDef::computed(
                "rayleigh_signal_intensity",
                ChannelSum::of(&["rayleigh_signal_channel_A_intensity", "rayleigh_signal_channel_B_intensity"]),
            )
            .array(),
        )
        .field(
            path(
                "mie_SNR",
                "product_confidence_data/*/observation_pcd/observation_alt_bin_pcd/*/mie_signal_to_noise_ratio",
            )
            .array(),
        )
        .field(
            path(
                "rayleigh_channel_A_SNR",
                "product_confidence_data/*/observation_pcd/observation_alt_bin_pcd/*/rayleigh_signal_to_noise_ratio_channel_a",
            )
            .array(),
        )
        .field(
            path(
                "rayleigh_channel_B_SNR",
                "product_confidence_data/*/observation_pcd/observation_alt_bin_pcd/*/rayleigh_signal_to_noise_ratio_channel_b",
            )
            .array(),
        )
        .field(
            FieldDef::computed(
                "rayleigh_SNR",
                ChannelSum::of(&["rayleigh_channel_A_SNR", "rayleigh_channel_B_SNR"]),
            )
            .array(),
        )
        .field(path("average_laser_energy", "product_confidence_data/*/observation_pcd/avg_uv_energy"))
        .field(path(
            "laser_frequency",
            "product_confidence_data/*/observation_pcd/avg_laser_frequency_offset",
        ))
        .field(
            path(
                "mie_bin_quality_flag",
                "wind_velocity/*/observation_wind_profile/mie_altitude_bin_wind_info/*/bin_quality_flag",
            )
            .array(),
        )
        .field(
            path(
                "rayleigh_bin_quality_flag",
                "wind_velocity/*/observation_wind_profile/rayleigh_altitude_bin_wind_info/*/bin_quality_flag",
            )
            .array(),
        )
        .field(FieldDef::computed(
            "albedo_off_nadir",
            AlbedoSample::new(
                "longitude_of_DEM_intersection",
                "latitude_of_DEM_intersection",
                SENSING_START,
                SENSING_STOP,
            ),
        ));

    let measurement = LevelDef::new("measurement")
        .nested_in("observation")
        .field(path(
            "measurement_time",
            "geolocation/*/measurement_aocs/*/measurement_centroid_time",
        ))
        .field(path(
            "measurement_longitude_of_DEM_intersection",
            "geolocation/*/measurement_geolocation/*/geolocation_of_dem_intersection/longitude_of_dem_intersection",
        ))
        .field(path(
            "measurement_latitude_of_DEM_intersection",
            "geolocation/*/measurement_geolocation/*/geolocation_of_dem_intersection/latitude_of_dem_intersection",
        ))
        .field(path(
            "measurement_altitude_of_DEM_intersection",
            "geolocation/*/measurement_geolocation/*/geolocation_of_dem_intersection/altitude_of_dem_intersection",
        ))
        .field(path(
            "measurement_velocity_at_DEM_intersection",
            "geolocation/*/measurement_geolocation/*/aocs_los_velocity",
        ))
        .field(
            path(
                "measurement_mie_HLOS_wind_speed",
                "wind_velocity/*/measurement_wind_profile/*/mie_altitude_bin_wind_info/*/wind_velocity",
            )
            .array(),
        )
        .field(
            path(
                "measurement_rayleigh_HLOS_wind_speed",
                "wind_velocity/*/measurement_wind_profile/*/rayleigh_altitude_bin_wind_info/*/wind_velocity",
            )
            .array(),
        )
        .field(
            path(
                "measurement_rayleigh_signal_channel_A_intensity",
                "useful_signal/*/measurement_useful_signal/*/rayleigh_altitude_bin_useful_signal_info/*/useful_signal_channel_a",
            )
            .array(),
        )
        .field(
            path(
                "measurement_rayleigh_signal_channel_B_intensity",
                "useful_signal/*/measurement_useful_signal/*/rayleigh_altitude_bin_useful_signal_info/*/useful_signal_channel_b",
            )
            .array(),
        )
        .field(
            FieldDef::computed(
                "measurement_rayleigh_signal_intensity",
                ChannelSum::of(&[
                    "measurement_rayleigh_signal_channel_A_intensity",
                    "measurement_rayleigh_signal_channel_B_intensity",
                ]),
            )
            .array(),
        )
        .field(path(
            "measurement_average_laser_energy",
            "product_confidence_data/*/measurement_pcd/*/avg_uv_energy",
        ))
        .field(FieldDef::computed(
            "measurement_albedo_off_nadir",
            AlbedoSample::new(
                "measurement_longitude_of_DEM_intersection",
                "measurement_latitude_of_DEM_intersection",
                SENSING_START,
                SENSING_STOP,
            ),
        ));

    FieldCatalog::builder(LEVEL_1B)
        .level(observation)
        .level(measurement)
        .overlap(
            "geolocation/*/measurement_aocs/*/measurement_centroid_time",
            &["time"],
        )
        .build()
}

// =============================================================================
// Level 2B and 2C
// =============================================================================

fn grouping(receiver: &str) -> LevelDef {
    let root = format!("{}_grouping", receiver);
    let field = |suffix: &str, leaf: &str| {
        path(&format!("{}_{}", root, suffix), &format!("{}/*/{}", root, leaf))
    };
    LevelDef::new(root.as_str())
        .records_at(root.as_str())
        .field(field("id", "grouping_result_id"))
        .field(field("time", "start_of_obs_datetime"))
        .field(field("start_obs", "which_l1b_brc1"))
        .field(field("start_meas_obs", "which_l1b_meas_within_this_brc1"))
        .field(field("end_obs", "which_l1b_brc2"))
        .field(field("end_meas_obs", "which_l1b_meas_within_this_brc2"))
}

fn profile(receiver: &str) -> LevelDef {
    let root = format!("{}_profile", receiver);
    let ids = format!("{}_wind_profile_wind_result_id", receiver);
    let first = |suffix: &str| {
        FieldDef::computed(
            format!("{}_{}", root, suffix),
            FirstReferenced::new(&ids, &format!("{}_wind_result_{}", receiver, suffix)),
        )
    };

    LevelDef::new(root.as_str())
        .records_at(root.as_str())
        .field(path(&ids, &format!("{}/*/l2b_wind_profiles/wind_result_id_number/*", root)).array())
        .field(path(
            &format!("{}_datetime_start", root),
            &format!("{}/*/profile_datetime_start", root),
        ))
        .field(path(
            &format!("{}_datetime_average", root),
            &format!("{}/*/profile_datetime_average", root),
        ))
        .field(path(
            &format!("{}_datetime_stop", root),
            &format!("{}/*/profile_datetime_stop", root),
        ))
        .field(first("lat_of_DEM_intersection"))
        .field(first("lon_of_DEM_intersection"))
        .field(first("geoid_separation"))
        .field(first("alt_of_DEM_intersection"))
        .field(FieldDef::computed(
            format!("{}_albedo_off_nadir", root),
            AlbedoSample::new(
                &format!("{}_lon_of_DEM_intersection", root),
                &format!("{}_lat_of_DEM_intersection", root),
                SENSING_START,
                SENSING_STOP,
            ),
        ))
}

fn wind(receiver: &str) -> LevelDef {
    let name = |suffix: &str| format!("{}_wind_result_{}", receiver, suffix);
    let geolocation = |suffix: &str, leaf: &str| {
        path(
            &name(suffix),
            &format!("{}_geolocation/*/windresult_geolocation/{}", receiver, leaf),
        )
    };
    let count = match receiver {
        "mie" => "sph/NumMieWindResults",
        _ => "sph/NumRayleighWindResults",
    };

    LevelDef::new(format!("{}_wind", receiver))
        .count_at(count)
        .field(path(&name("id"), &format!("{}_geolocation/*/wind_result_id", receiver)))
        .field(geolocation("start_time", "datetime_start"))
        .field(geolocation("COG_time", "datetime_cog"))
        .field(geolocation("stop_time", "datetime_stop"))
        .field(geolocation("bottom_altitude", "altitude_bottom"))
        .field(geolocation("COG_altitude", "altitude_vcog"))
        .field(geolocation("top_altitude", "altitude_top"))
        .field(geolocation("COG_latitude", "latitude_cog"))
        .field(geolocation("COG_longitude", "longitude_cog"))
        .field(geolocation("lat_of_DEM_intersection", "lat_of_dem_intersection"))
        .field(geolocation("lon_of_DEM_intersection", "lon_of_dem_intersection"))
        .field(geolocation("geoid_separation", "wgs84_to_geoid_altitude"))
        .field(geolocation("alt_of_DEM_intersection", "alt_of_dem_intersection"))
        .field(path(
            &name("wind_velocity"),
            &format!("{}_hloswind/*/windresult/{}_wind_velocity", receiver, receiver),
        ))
        .field(path(
            &name("validity_flag"),
            &format!("{}_hloswind/*/windresult/validity_flag", receiver),
        ))
        .field(FieldDef::computed(
            name("albedo_off_nadir"),
            AlbedoSample::new(
                &name("lon_of_DEM_intersection"),
                &name("lat_of_DEM_intersection"),
                SENSING_START,
                SENSING_STOP,
            ),
        ))
}

/// Wind result quality fields carried by Level 2B only
fn wind_quality(level: LevelDef, receiver: &str) -> LevelDef {
    let name = |suffix: &str| format!("{}_wind_result_{}", receiver, suffix);
    let qc = |suffix: &str, leaf: &str| {
        path(
            &name(suffix),
            &format!("{}_wind_prod_conf_data/*/{}_wind_qc/{}", receiver, receiver, leaf),
        )
    };
    let result = |suffix: &str, leaf: &str| {
        path(&name(suffix), &format!("{}_hloswind/*/windresult/{}", receiver, leaf))
    };

    let level = level
        .field(result("range_bin_number", "which_range_bin"))
        .field(result("observation_type", "observation_type"))
        .field(result("integration_length", "integration_length"))
        .field(result("num_of_measurements", "n_meas_in_class"))
        .field(qc("HLOS_error", "hlos_error_estimate"))
        .field(qc("QC_flags_1", "flags1"))
        .field(qc("QC_flags_2", "flags2"))
        .field(qc("QC_flags_3", "flags3"))
        .field(qc("scattering_ratio", "scattering_ratio"));
    match receiver {
        "mie" => level.field(qc("SNR", "mie_snr")),
        _ => level
            .field(result("reference_pressure", "reference_pressure"))
            .field(result("reference_temperature", "reference_temperature"))
            .field(result("reference_backscatter_ratio", "reference_backscatter_ratio")),
    }
}

/// Assimilation fields carried by Level 2C only
fn wind_assimilation(level: LevelDef, receiver: &str) -> LevelDef {
    let assimilation = |suffix: &str| format!("{}_assimilation_{}", receiver, suffix);
    let vecwind = |suffix: &str, leaf: &str| {
        path(
            &assimilation(suffix),
            &format!("{}_vecwind/*/height_bin_vecwind/{}", receiver, leaf),
        )
    };

    level
        .field(vecwind("background_u_wind_velocity", "background_zonal_wind_velocity"))
        .field(vecwind("background_v_wind_velocity", "background_meridional_wind_velocity"))
        .field(vecwind("analysis_u_wind_velocity", "analysis_zonal_wind_velocity"))
        .field(vecwind("analysis_v_wind_velocity", "analysis_meridional_wind_velocity"))
        .field(FieldDef::computed(
            assimilation("background_horizontal_wind_velocity"),
            HorizontalWind::new(
                &assimilation("background_u_wind_velocity"),
                &assimilation("background_v_wind_velocity"),
                WindComponent::Speed,
            ),
        ))
        .field(FieldDef::computed(
            assimilation("background_wind_direction"),
            HorizontalWind::new(
                &assimilation("background_u_wind_velocity"),
                &assimilation("background_v_wind_velocity"),
                WindComponent::Direction,
            ),
        ))
        .field(FieldDef::computed(
            assimilation("analysis_horizontal_wind_velocity"),
            HorizontalWind::new(
                &assimilation("analysis_u_wind_velocity"),
                &assimilation("analysis_v_wind_velocity"),
                WindComponent::Speed,
            ),
        ))
        .field(FieldDef::computed(
            assimilation("analysis_wind_direction"),
            HorizontalWind::new(
                &assimilation("analysis_u_wind_velocity"),
                &assimilation("analysis_v_wind_velocity"),
                WindComponent::Direction,
            ),
        ))
}

fn l1b_measurement() -> LevelDef {
    LevelDef::new("measurement")
        .records_at("meas_map")
        .field(path("mie_measurement_map", "meas_map/*/mie_map_of_l1b_meas_used/*/which_l2b_wind_id").array())
        .field(
            path(
                "rayleigh_measurement_map",
                "meas_map/*/rayleigh_map_of_l1b_meas_used/*/which_l2b_wind_id",
            )
            .array(),
        )
        .field(path("mie_measurement_weight", "meas_map/*/mie_map_of_l1b_meas_used/*/weight").array())
        .field(path("rayleigh_measurement_weight", "meas_map/*/rayleigh_map_of_l1b_meas_used/*/weight").array())
        .field(path("l1B_measurement_time", "meas_product_confid_data/*/start_of_obs_datetime"))
        .field(path("l1B_num_of_measurements_per_obs", "meas_product_confid_data/*/l1b_meas_number"))
        .field(path("l1B_obs_number", "meas_product_confid_data/*/l1b_brc_number"))
}

/// Catalog of `ALD_U_N_2B`
///
/// Profile and measurement selections propagate to the wind results they
/// reference.
pub fn level_2b() -> Result<FieldCatalog> {
    let measurement = l1b_measurement()
        .field(path(
            "optical_prop_algo_extinction",
            "meas_product_confid_data/*/opt_prop_result/extinction_iterative",
        ))
        .field(path(
            "optical_prop_algo_scattering_ratio",
            "meas_product_confid_data/*/opt_prop_result/scattering_ratio_iterative",
        ))
        .field(path(
            "optical_prop_crosstalk_detected",
            "meas_product_confid_data/*/opt_prop_result/xtalk_detected",
        ));

    FieldCatalog::builder(LEVEL_2B)
        .level(grouping("mie"))
        .level(grouping("rayleigh"))
        .level(profile("mie"))
        .level(profile("rayleigh"))
        .level(wind_quality(wind("mie"), "mie"))
        .level(wind_quality(wind("rayleigh"), "rayleigh"))
        .level(measurement)
        .join("mie_profile", "mie_wind", "mie_wind_profile_wind_result_id")
        .join("rayleigh_profile", "rayleigh_wind", "rayleigh_wind_profile_wind_result_id")
        .join("measurement", "mie_wind", "mie_measurement_map")
        .join("measurement", "rayleigh_wind", "rayleigh_measurement_map")
        .build()
}

/// Catalog of `ALD_U_N_2C`
///
/// Level 2B plus the assimilated wind vectors of each wind result.
pub fn level_2c() -> Result<FieldCatalog> {
    FieldCatalog::builder(LEVEL_2C)
        .level(grouping("mie"))
        .level(grouping("rayleigh"))
        .level(profile("mie"))
        .level(profile("rayleigh"))
        .level(wind_assimilation(wind("mie"), "mie"))
        .level(wind_assimilation(wind("rayleigh"), "rayleigh"))
        .level(l1b_measurement())
        .join("mie_profile", "mie_wind", "mie_wind_profile_wind_result_id")
        .join("rayleigh_profile", "rayleigh_wind", "rayleigh_wind_profile_wind_result_id")
        .join("measurement", "mie_wind", "mie_measurement_map")
        .join("measurement", "rayleigh_wind", "rayleigh_measurement_map")
        .build()
}

// =============================================================================
// Calibration products
// =============================================================================

/// Data set record list of a calibration product
fn data_set_records(kind: &str) -> String {
    format!(
        "Earth_Explorer_File/Data_Block/Auxiliary_Calibration_{}/List_of_Data_Set_Records/Data_Set_Record",
        kind
    )
}

/// One level of calibration records, fields relative to a record
struct CalibrationLevel {
    root: String,
    level: LevelDef,
}

impl CalibrationLevel {
    fn new(kind: &str) -> Self {
        let root = data_set_records(kind);
        let level = LevelDef::new("calibration").records_at(root.as_str());
        Self { root, level }
    }

    /// Scalar per record
    fn value(mut self, name: &str, leaf: &str) -> Self {
        self.level = self.level.field(path(name, &format!("{}/*/{}", self.root, leaf)));
        self
    }

    /// One sample per entry of `list`
    fn list(mut self, name: &str, list: &str, leaf: &str) -> Self {
        self.level = self
            .level
            .field(path(name, &format!("{}/*/{}/*/{}", self.root, list, leaf)).array());
        self
    }

    /// One profile per entry of `list`
    fn list_profile(mut self, name: &str, list: &str, leaf: &str) -> Self {
        self.level = self
            .level
            .field(path(name, &format!("{}/*/{}/*/{}/*", self.root, list, leaf)).array());
        self
    }

    /// One profile per record
    fn profile(mut self, name: &str, leaf: &str) -> Self {
        self.level = self.level.field(path(name, &format!("{}/*/{}/*", self.root, leaf)).array());
        self
    }

    fn build(self, product_type: &str) -> Result<FieldCatalog> {
        FieldCatalog::builder(product_type).level(self.level).build()
    }
}

/// Catalog of `AUX_ISR_1B`
pub fn aux_isr() -> Result<FieldCatalog> {
    const RESULTS: &str = "List_of_ISR_Results/ISR_Result";
    let mut level = CalibrationLevel::new("ISR")
        .value(
            "freq_mie_USR_closest_to_rayleigh_filter_centre",
            "Freq_Mie_USR_Closest_to_Rayleigh_Filter_Centre",
        )
        .value("frequency_Rayleigh_filter_centre", "Freq_Rayleigh_Filter_Centre");
    for (name, leaf) in [
        ("num_of_valid_mie_results", "Data_Stat/Num_Mie_Used"),
        ("num_of_valid_rayleigh_results", "Data_Stat/Num_Rayleigh_Used"),
        ("laser_frequency_offset", "Laser_Freq_Offset"),
        ("mie_valid", "Mie_Valid"),
        ("rayleigh_valid", "Rayleigh_Valid"),
        ("fizeau_transmission", "Fizeau_Transmission"),
        ("mie_response", "Mie_Response"),
        ("rayleigh_channel_A_response", "Rayleigh_A_Response"),
        ("rayleigh_channel_B_response", "Rayleigh_B_Response"),
        ("accumulated_laser_energy_Mie", "Data_Quality/Accumulated_Laser_Energy_Mie"),
        ("mean_laser_energy_mie", "Data_Quality/Mean_Laser_Energy_Mie"),
        ("accumulated_laser_energy_rayleigh", "Data_Quality/Accumulated_Laser_Energy_Rayleigh"),
        ("mean_laser_energy_rayleigh", "Data_Quality/Mean_Laser_Energy_Rayleigh"),
        ("laser_energy_drift", "Data_Quality/Laser_Energy_Drift"),
        ("downhill_simplex_used", "Data_Quality/Downhill_Simplex_Used"),
        ("num_of_iterations_mie_core_1", "Data_Quality/Mie_Core_1/Num_Iterations_Core_1"),
        ("last_peak_difference_mie_core_1", "Data_Quality/Mie_Core_1/Last_Peak_Difference"),
        ("FWHM_mie_core_2", "Data_Quality/Mie_Core_2/Fwhm"),
        ("num_of_iterations_mie_core_2", "Data_Quality/Mie_Core_2/Num_Iterations_Core_2"),
        ("rayleigh_spectrometer_temperature_9", "Etalon_Average_Temperature/Ray_Spectrometer_Temp_9"),
        ("rayleigh_spectrometer_temperature_10", "Etalon_Average_Temperature/Ray_Spectrometer_Temp_10"),
        ("rayleigh_spectrometer_temperature_11", "Etalon_Average_Temperature/Ray_Spectrometer_Temp_11"),
        (
            "rayleigh_thermal_hood_temperature_1",
            "RSPT_Average_Temperature/Thermocouple_8_Ray_Spectrometer_Thermal_Hood_1",
        ),
        (
            "rayleigh_thermal_hood_temperature_2",
            "RSPT_Average_Temperature/Thermocouple_9_Ray_Spectrometer_Thermal_Hood_2",
        ),
        (
            "rayleigh_thermal_hood_temperature_3",
            "RSPT_Average_Temperature/Thermocouple_10_Ray_Spectrometer_Thermal_Hood_3",
        ),
        (
            "rayleigh_thermal_hood_temperature_4",
            "RSPT_Average_Temperature/Thermocouple_11_Ray_Spectrometer_Thermal_Hood_4",
        ),
        ("rayleigh_optical_baseplate_avg_temperature", "Optical_Baseplate_Average_Temperature"),
    ] {
        level = level.list(name, RESULTS, leaf);
    }
    level.build(AUX_ISR)
}

/// Frequency step fields shared by the Mie and Rayleigh response calibrations
fn response_calibration(kind: &str, receiver: &str) -> CalibrationLevel {
    const GEOLOCATIONS: &str = "List_of_Frequency_Step_Geolocations/Frequency_Step_Geolocation";
    const RESULTS: &str = "List_of_Frequency_Step_Results/Frequency_Step_Result";
    let error = |prefix: &str| format!("{}_error_{}_response", prefix, receiver);
    let std_dev = |prefix: &str| format!("{}_error_{}_response_std_dev", prefix, receiver);
    let leaf_error = |prefix: &str| format!("{}_Error_{}_Response", prefix, capitalized(receiver));

    let mut level = CalibrationLevel::new(kind)
        .list("lat_of_DEM_intersection", GEOLOCATIONS, "Latitude_of_DEM_Intersection")
        .list("lon_of_DEM_intersection", GEOLOCATIONS, "Longitude_of_DEM_Intersection")
        .list("time_freq_step", GEOLOCATIONS, "Start_of_Observation_Time_Last_BRC")
        .list_profile("altitude", GEOLOCATIONS, "Altitude")
        .list_profile("satellite_range", GEOLOCATIONS, "Satellite_Range")
        .list_profile("normalised_useful_signal", RESULTS, "Normalized_Useful_Signal")
        .list(&error("measurement"), RESULTS, &leaf_error("Measurement"));
    for (name, leaf) in [
        ("frequency_offset", "Frequency_Offset"),
        ("frequency_valid", "Frequency_Valid"),
        ("measurement_response", "Measurement_Response"),
        ("measurement_response_valid", "Measurement_Response_Valid"),
        ("reference_pulse_response", "Reference_Pulse_Response"),
        ("reference_pulse_response_valid", "Reference_Pulse_Response_Valid"),
        ("num_measurements_usable", "Frequency_Step_Data_Statistics/Num_Measurements_Usable"),
        ("num_valid_measurements", "Frequency_Step_Data_Statistics/Num_Valid_Measurements"),
        ("num_reference_pulses_usable", "Frequency_Step_Data_Statistics/Num_Reference_Pulses_Usable"),
    ] {
        level = level.list(name, RESULTS, leaf);
    }

    level = level
        .value(
            "measurement_mean_sensitivity",
            "Measurement_Response_Calibration/Measurement_Mean_Sensitivity",
        )
        .value(
            "measurement_zero_frequency",
            "Measurement_Response_Calibration/Measurement_Zero_Frequency",
        )
        .value(
            &std_dev("measurement"),
            &format!("Measurement_Response_Calibration/{}_Std_Dev", leaf_error("Measurement")),
        )
        .value(
            "measurement_offset_frequency",
            "Measurement_Response_Calibration/Measurement_Offset_Frequency",
        )
        .value(
            "reference_pulse_mean_sensitivity",
            "Reference_Pulse_Response_Calibration/Reference_Pulse_Mean_Sensitivity",
        )
        .value(
            "reference_pulse_zero_frequency",
            "Reference_Pulse_Response_Calibration/Reference_Pulse_Zero_Frequency",
        )
        .value(
            &std_dev("reference_pulse"),
            &format!(
                "Reference_Pulse_Response_Calibration/{}_Std_Dev",
                leaf_error("Reference_Pulse")
            ),
        )
        .value(
            "reference_pulse_offset_frequency",
            "Reference_Pulse_Response_Calibration/Reference_Pulse_Offset_Frequency",
        );

    for (name, leaf) in [
        ("satisfied_min_valid_freq_steps_per_cal", "Satisfied_Min_Valid_Freq_Per_Cal"),
        ("freq_offset_data_monotonic", "Freq_Offset_Data_Monotonic"),
        ("num_of_valid_frequency_steps", "Num_Valid_Frequency_Steps"),
        ("measurement_mean_sensitivity_valid", "Measurement_Calibration_Validity/Mean_Sensitivity_Valid"),
        (
            "measurement_error_response_std_dev_valid",
            "Measurement_Calibration_Validity/Error_Response_Std_Dev_Valid",
        ),
        (
            "measurement_zero_frequency_response_valid",
            "Measurement_Calibration_Validity/Zero_Freq_Response_Valid",
        ),
        ("measurement_data_monotonic", "Measurement_Calibration_Validity/Data_Monotonic"),
        (
            "reference_pulse_mean_sensitivity_valid",
            "Reference_Pulse_Calibration_Validity/Mean_Sensitivity_Valid",
        ),
        (
            "reference_pulse_error_response_std_dev_valid",
            "Reference_Pulse_Calibration_Validity/Error_Response_Std_Dev_Valid",
        ),
        (
            "reference_pulse_zero_frequency_response_valid",
            "Reference_Pulse_Calibration_Validity/Zero_Freq_Response_Valid",
        ),
        ("reference_pulse_data_monotonic", "Reference_Pulse_Calibration_Validity/Data_Monotonic"),
    ] {
        level = level.value(name, &format!("Calibration_Validity_Indicators/{}", leaf));
    }
    level
}

fn capitalized(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Catalog of `AUX_MRC_1B`
pub fn aux_mrc() -> Result<FieldCatalog> {
    const RESULTS: &str = "List_of_Frequency_Step_Results/Frequency_Step_Result";
    const CORE: &str = "Calibration_Validity_Indicators/List_of_Calibration_MC_Results/Calibration_MC_Result";
    let mut level = response_calibration("MRC", "mie")
        .list(
            "reference_pulse_error_mie_response",
            RESULTS,
            "Reference_Pulse_Error_Mie_Response",
        )
        .list_profile("mie_scattering_ratio", RESULTS, "Mie_Scattering_Ratio");
    for (name, leaf) in [
        (
            "num_mie_core_algo_fails_measurements",
            "Frequency_Step_Data_Statistics/Num_Mie_Core_Algo_Fails_Measurements",
        ),
        (
            "num_ground_echoes_not_detected_measurements",
            "Frequency_Step_Data_Statistics/Num_Ground_Echo_Not_Detected_Measurements",
        ),
    ] {
        level = level.list(name, RESULTS, leaf);
    }
    for (name, leaf) in [
        ("mie_core_measurement_FWHM", "FWHM"),
        ("mie_core_measurement_amplitude", "Amplitude"),
        ("mie_core_measurement_offset", "Offset"),
    ] {
        level = level.list(
            name,
            CORE,
            &format!("List_of_Measurement_MC_Results/Measurement_MC_Results/*/{}", leaf),
        );
    }
    level.build(AUX_MRC)
}

/// Catalog of `AUX_RRC_1B`
///
/// Adds the ground echo calibration and the spectrometer temperatures to
/// the shared response calibration fields.
pub fn aux_rrc() -> Result<FieldCatalog> {
    const GEOLOCATIONS: &str = "List_of_Frequency_Step_Geolocations/Frequency_Step_Geolocation";
    const RESULTS: &str = "List_of_Frequency_Step_Results/Frequency_Step_Result";
    const TEMPERATURES: &str = "List_of_Frequency_Step_Temperatures/Frequency_Step_Temperature";
    const GROUND: &str = "Ground_Measurement_Response_Calibration";

    let mut level = response_calibration("RRC", "rayleigh")
        .list_profile("geoid_separation_obs", GEOLOCATIONS, "List_of_Geoid_Separations/Geoid_Separation")
        .list(
            "reference_pulse_error_rayleigh_response",
            RESULTS,
            "Ground_Measurement_Error_Rayleigh_Response",
        )
        .profile(
            "measurement_error_fit_coefficient",
            "Measurement_Response_Calibration/List_of_Measurement_Error_Fit_Coefficients/Measurement_Error_Fit_Coefficient",
        )
        .profile(
            "reference_pulse_error_fit_coefficient",
            "Reference_Pulse_Response_Calibration/List_of_Reference_Pulse_Error_Fit_Coefficients/Reference_Pulse_Error_Fit_Coefficient",
        )
        .profile(
            "ground_measurement_error_fit_coefficient",
            "Ground_Measurement_Response_Calibration/List_of_Ground_Measurement_Error_Fit_Coefficients/Ground_Measurement_Error_Fit_Coefficient",
        );
    for (name, leaf) in [
        ("ground_frequency_valid", "Ground_Frequency_Valid"),
        ("ground_measurement_response", "Ground_Measurement_Response"),
        ("ground_measurement_response_valid", "Ground_Measurement_Response_Valid"),
        (
            "ground_measurement_error_rayleigh_response",
            "Ground_Measurement_Error_Rayleigh_Response",
        ),
        (
            "num_measurements_valid_ground",
            "Frequency_Step_Data_Statistics/Num_Measurements_Valid_Ground",
        ),
    ] {
        level = level.list(name, RESULTS, leaf);
    }
    for (name, leaf) in [
        ("ground_measurement_mean_sensitivity", "Ground_Measurement_Mean_Sensitivity"),
        ("ground_measurement_zero_frequency", "Ground_Measurement_Zero_Frequency"),
        (
            "ground_measurement_error_rayleigh_response_std_dev",
            "Ground_Measurement_Error_Rayleigh_Response_Std_Dev",
        ),
        ("ground_measurement_offset_frequency", "Ground_Measurement_Offset_Frequency"),
    ] {
        level = level.value(name, &format!("{}/{}", GROUND, leaf));
    }
    level = level
        .value(
            "satisfied_min_valid_ground_freq_steps_per_cal",
            "Calibration_Validity_Indicators/Satisfied_Min_Valid_Ground_Freq_Per_Cal",
        )
        .value(
            "num_of_valid_ground_frequency_steps",
            "Calibration_Validity_Indicators/Num_Valid_Ground_Frequency_Steps",
        )
        .value(
            "ground_measurement_data_monotonic",
            "Calibration_Validity_Indicators/Ground_Measurement_Calibration_Validity/Data_Monotonic",
        );
    for (name, leaf) in [
        ("rayleigh_spectrometer_temperature_9", "Etalon_Average_Temperature/Ray_Spectrometer_Temp_9"),
        ("rayleigh_spectrometer_temperature_10", "Etalon_Average_Temperature/Ray_Spectrometer_Temp_10"),
        ("rayleigh_spectrometer_temperature_11", "Etalon_Average_Temperature/Ray_Spectrometer_Temp_11"),
        (
            "rayleigh_thermal_hood_temperature_1",
            "RSPT_Average_Temperature/Thermocouple_8_Ray_Spectrometer_Thermal_Hood_1",
        ),
        (
            "rayleigh_thermal_hood_temperature_2",
            "RSPT_Average_Temperature/Thermocouple_9_Ray_Spectrometer_Thermal_Hood_2",
        ),
        (
            "rayleigh_thermal_hood_temperature_3",
            "RSPT_Average_Temperature/Thermocouple_10_Ray_Spectrometer_Thermal_Hood_3",
        ),
        (
            "rayleigh_thermal_hood_temperature_4",
            "RSPT_Average_Temperature/Thermocouple_11_Ray_Spectrometer_Thermal_Hood_4",
        ),
        ("rayleigh_optical_baseplate_avg_temperature", "Optical_Baseplate_Average"),
    ] {
        level = level.list(name, TEMPERATURES, leaf);
    }
    level.build(AUX_RRC)
}

/// Catalog of `AUX_ZWC_1B`
pub fn aux_zwc() -> Result<FieldCatalog> {
    let mut level = CalibrationLevel::new("ZWC")
        .profile("mie_range", "Observation_Info/Mie_Satellite_Range_to_Target")
        .profile("rayleigh_range", "Observation_Info/Rayleigh_Satellite_Range_to_Target")
        .profile("DEM_height", "Measurement_Info/DEM_Height");
    for (name, leaf) in [
        ("lat_of_DEM_intersection", "Observation_Info/Latitude_of_DEM_Intersection"),
        ("lon_of_DEM_intersection", "Observation_Info/Longitude_of_DEM_Intersection"),
        ("roll_angle", "Observation_Info/Roll_Angle"),
        ("pitch_angle", "Observation_Info/Pitch_Angle"),
        ("yaw_angle", "Observation_Info/Yaw_Angle"),
        ("ZWC_result_type", "ZWC_Result_Type"),
        ("mie_ground_correction_velocity", "Mie_Ground_Correction_Velocity"),
        ("rayleigh_ground_correction_velocity", "Rayleigh_Ground_Correction_Velocity"),
        ("num_of_mie_ground_bins", "Validity_Indicators/Number_of_Mie_Ground_Bins"),
        (
            "mie_avg_ground_echo_bin_thickness",
            "Validity_Indicators/Mie_Average_Ground_Echo_Bin_Thickness",
        ),
        (
            "rayleigh_avg_ground_echo_bin_thickness",
            "Validity_Indicators/Rayleigh_Average_Ground_Echo_Bin_Thickness",
        ),
        (
            "mie_avg_ground_echo_bin_thickness_above_DEM",
            "Validity_Indicators/Mie_Average_Ground_Echo_Bin_Thickness_Above_DEM",
        ),
        (
            "rayleigh_avg_ground_echo_bin_thickness_above_DEM",
            "Validity_Indicators/Rayleigh_Average_Ground_Echo_Bin_Thickness_Above_DEM",
        ),
        ("mie_top_ground_bin_obs", "Validity_Indicators/Mie_Min_Top_Ground_Bin"),
        ("rayleigh_top_ground_bin_obs", "Validity_Indicators/Rayleigh_Min_Top_Ground_Bin"),
        ("mie_bottom_ground_bin_obs", "Validity_Indicators/Mie_Max_Bottom_Ground_Bin"),
        ("rayleigh_bottom_ground_bin_obs", "Validity_Indicators/Rayleigh_Max_Bottom_Ground_Bin"),
    ] {
        level = level.value(name, leaf);
    }

    const MIE: &str =
        "Validity_Indicators/List_of_Mie_Measurement_Validity_Indicators/Mie_Measurement_Validity_Indicators";
    const RAYLEIGH: &str =
        "Validity_Indicators/List_of_Rayleigh_Measurement_Validity_Indicators/Rayleigh_Measurement_Validity_Indicators";
    for (receiver, list) in [("mie", MIE), ("rayleigh", RAYLEIGH)] {
        let name = |suffix: &str| format!("{}_{}", receiver, suffix);
        level = level
            .list(&name("measurements_used"), list, "Measurement_Used")
            .list(&name("top_ground_bin_meas"), list, "Top_Ground_Bin")
            .list(&name("bottom_ground_bin_meas"), list, "Bottom_Ground_Bin")
            .list(&name("DEM_ground_bin"), list, "Expected_Ground_Bin_Index")
            .list(
                &name("height_difference_top_to_DEM_ground_bin"),
                list,
                "Height_Difference_Top_to_Expected",
            );
    }
    level
        .list("mie_ground_bin_SNR_meas", MIE, "Mean_Ground_Bin_SNR")
        .list("rayleigh_channel_A_ground_SNR_meas", RAYLEIGH, "Channel_A_Mean_Ground_Bin_SNR")
        .list("rayleigh_channel_B_ground_SNR_meas", RAYLEIGH, "Channel_B_Mean_Ground_Bin_SNR")
        .build(AUX_ZWC)
}

// =============================================================================
// AUX_MET
// =============================================================================

fn track(suffix: &str) -> LevelDef {
    let geo = format!("geo_{}", suffix);
    let met = format!("met_{}", suffix);
    let name = |field: &str| format!("{}_{}", field, suffix);
    let surface = |field: &str, leaf: &str| path(&name(field), &format!("{}/*/{}", met, leaf));
    let layer = |field: &str, leaf: &str| path(&name(field), &format!("{}/*/profile_data/*/{}", met, leaf)).array();

    LevelDef::new(suffix)
        .records_at(geo.as_str())
        .field(path(&name("time"), &format!("{}/*/amd_datetime", geo)))
        .field(path(&name("latitude"), &format!("{}/*/amd_latitude", geo)))
        .field(path(&name("longitude"), &format!("{}/*/amd_longitude", geo)))
        .field(surface("surface_wind_component_u", "amd_us"))
        .field(surface("surface_wind_component_v", "amd_vs"))
        .field(surface("surface_pressure", "amd_ps"))
        .field(surface("surface_altitude", "amd_zs"))
        .field(layer("layer_validity_flag", "amd_validity_flag"))
        .field(layer("layer_pressure", "amd_pnom"))
        .field(layer("layer_altitude", "amd_znom"))
        .field(layer("layer_temperature", "amd_t"))
        .field(layer("layer_wind_component_u", "amd_u"))
        .field(layer("layer_wind_component_v", "amd_v"))
        .field(layer("layer_rel_humidity", "amd_rh"))
        .field(layer("layer_spec_humidity", "amd_q"))
        .field(layer("layer_cloud_cover", "amd_cc"))
        .field(layer("layer_cloud_liquid_water_content", "amd_clwc"))
        .field(layer("layer_cloud_ice_water_content", "amd_ciwc"))
}

/// Catalog of `AUX_MET_12`
pub fn aux_met() -> Result<FieldCatalog> {
    FieldCatalog::builder(AUX_MET)
        .level(track("off_nadir"))
        .level(track("nadir"))
        .build()
}
