/// Scoring weights and caps for contractor matching. The defaults are the
/// production values; tests narrow them where a scenario needs to.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Exact ZIP match on a service area.
    pub zip_score: f32,
    /// Fallback when a service area contains the lead's city name.
    pub city_score: f32,
    /// Scaled by the fraction of lead project types the contractor covers.
    pub service_weight: f32,
    pub high_rating_threshold: f32,
    pub high_rating_bonus: f32,
    pub good_rating_threshold: f32,
    pub good_rating_bonus: f32,
    pub review_count_threshold: u32,
    pub review_count_bonus: f32,
    /// Candidates below this score are dropped.
    pub minimum_score: f32,
    /// Matches are truncated to this many contractors.
    pub max_matches: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            zip_score: 40.0,
            city_score: 20.0,
            service_weight: 30.0,
            high_rating_threshold: 4.5,
            high_rating_bonus: 15.0,
            good_rating_threshold: 4.0,
            good_rating_bonus: 10.0,
            review_count_threshold: 10,
            review_count_bonus: 10.0,
            minimum_score: 30.0,
            max_matches: 5,
        }
    }
}
