//! Statistical helpers shared by the training crates.
//!
//! Currently this is limited to [`descriptive`] statistics, used to summarize
//! population fitness and episode rewards.
//!
//! # Examples
//!
//! ```
//! use rpsbr_stats::descriptive::DescriptiveStats;
//!
//! let values = [1.0, 2.0, 3.0, 4.0, 5.0];
//! let stats = DescriptiveStats::new(values).unwrap();
//! assert_eq!(stats.mean, 3.0);
//! ```

pub mod descriptive;
