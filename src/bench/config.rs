//! Configuration profile registry.
//!
//! Profiles are static and versioned together with the scoring scheme:
//! changing a size here breaks comparability with existing leaderboard
//! entries of the same `config_name`.

use serde::Serialize;

use crate::core::ProfileName;

use super::harness::RunPolicy;

/// Problem sizes and run counts for one benchmark weight class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigProfile {
    pub name: ProfileName,
    pub n_runs: usize,
    pub disk_file_size: usize,
    pub cpu_prime_limit: u64,
    pub cpu_array_size: usize,
    pub memory_shape: (usize, usize),
    pub gpu_matrix_shape: (usize, usize),
    pub animation_frames: usize,
    pub image_shape: (usize, usize),
    pub plot_points: usize,
    pub ml_n_samples: usize,
    pub ml_n_features: usize,
}

const LIGHT: ConfigProfile = ConfigProfile {
    name: ProfileName::Light,
    n_runs: 1,
    disk_file_size: 10_000_000,
    cpu_prime_limit: 10_000,
    cpu_array_size: 100_000,
    memory_shape: (1_000, 1_000),
    gpu_matrix_shape: (1_000, 1_000),
    animation_frames: 50,
    image_shape: (1_000, 1_000),
    plot_points: 10_000,
    ml_n_samples: 2_000,
    ml_n_features: 20,
};

const STANDARD: ConfigProfile = ConfigProfile {
    name: ProfileName::Standard,
    n_runs: 3,
    disk_file_size: 50_000_000,
    cpu_prime_limit: 20_000,
    cpu_array_size: 1_000_000,
    memory_shape: (10_000, 10_000),
    gpu_matrix_shape: (10_000, 10_000),
    animation_frames: 100,
    image_shape: (4_000, 4_000),
    plot_points: 100_000,
    ml_n_samples: 10_000,
    ml_n_features: 20,
};

const HEAVY: ConfigProfile = ConfigProfile {
    name: ProfileName::Heavy,
    n_runs: 5,
    disk_file_size: 100_000_000,
    cpu_prime_limit: 50_000,
    cpu_array_size: 5_000_000,
    memory_shape: (20_000, 20_000),
    gpu_matrix_shape: (20_000, 20_000),
    animation_frames: 200,
    image_shape: (8_000, 8_000),
    plot_points: 200_000,
    ml_n_samples: 50_000,
    ml_n_features: 20,
};

impl ConfigProfile {
    pub fn get(name: ProfileName) -> &'static ConfigProfile {
        match name {
            ProfileName::Light => &LIGHT,
            ProfileName::Standard => &STANDARD,
            ProfileName::Heavy => &HEAVY,
        }
    }

    /// Every registered profile, lightest first.
    pub fn all() -> [&'static ConfigProfile; 3] {
        [&LIGHT, &STANDARD, &HEAVY]
    }

    /// Median over the profile's run count.
    pub fn run_policy(&self) -> RunPolicy {
        RunPolicy::median(self.n_runs)
    }
}

impl Default for ConfigProfile {
    fn default() -> Self {
        ConfigProfile::get(ProfileName::default()).clone()
    }
}

/// Print every profile, one block per profile.
pub fn list_profiles() {
    for p in ConfigProfile::all() {
        println!("{}", p.name);
        println!("  n_runs            {}", p.n_runs);
        println!("  disk_file_size    {}", p.disk_file_size);
        println!("  cpu_prime_limit   {}", p.cpu_prime_limit);
        println!("  cpu_array_size    {}", p.cpu_array_size);
        println!("  memory_shape      {}x{}", p.memory_shape.0, p.memory_shape.1);
        println!("  gpu_matrix_shape  {}x{}", p.gpu_matrix_shape.0, p.gpu_matrix_shape.1);
        println!("  animation_frames  {}", p.animation_frames);
        println!("  image_shape       {}x{}", p.image_shape.0, p.image_shape.1);
        println!("  plot_points       {}", p.plot_points);
        println!("  ml_samples        {}x{}", p.ml_n_samples, p.ml_n_features);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_resolves_every_name() {
        for name in ProfileName::ALL {
            assert_eq!(ConfigProfile::get(name).name, name);
        }
    }

    #[test]
    fn test_profiles_scale_monotonically() {
        let [light, standard, heavy] = ConfigProfile::all();
        assert!(light.n_runs < standard.n_runs && standard.n_runs < heavy.n_runs);
        assert!(light.disk_file_size < standard.disk_file_size);
        assert!(standard.plot_points < heavy.plot_points);
        assert!(light.n_runs >= 1);
    }

    #[test]
    fn test_default_profile_is_standard() {
        let p = ConfigProfile::default();
        assert_eq!(p.name, ProfileName::Standard);
        assert_eq!(p.run_policy(), RunPolicy::median(3));
    }
}
