use super::config::MatchingConfig;
use crate::marketplace::domain::{ContractorProfile, Lead};

/// Additive score plus the reason strings shown to the contractor. Every
/// branch that adds points also records a reason.
pub(crate) fn score_contractor(
    lead: &Lead,
    contractor: &ContractorProfile,
    config: &MatchingConfig,
) -> (f32, Vec<String>) {
    let mut score = 0.0;
    let mut reasons = Vec::new();

    if contractor
        .service_areas
        .iter()
        .any(|area| area == &lead.address.zip)
    {
        score += config.zip_score;
        reasons.push("Serves your area".to_string());
    } else {
        let city = lead.address.city.to_lowercase();
        let city_match = contractor
            .service_areas
            .iter()
            .any(|area| area.to_lowercase().contains(&city));
        if city_match {
            score += config.city_score;
            reasons.push("Serves nearby areas".to_string());
        }
    }

    // Deliberately loose: case-insensitive substring containment in either
    // direction, so "Bathroom Modifications" covers the "bathroom" tag.
    let matched_types: Vec<&str> = lead
        .project_type
        .iter()
        .filter(|project_type| {
            let wanted = project_type.to_lowercase();
            contractor.services.iter().any(|service| {
                let offered = service.to_lowercase();
                offered.contains(&wanted) || wanted.contains(&offered)
            })
        })
        .map(String::as_str)
        .collect();

    if !matched_types.is_empty() && !lead.project_type.is_empty() {
        score += config.service_weight * (matched_types.len() as f32 / lead.project_type.len() as f32);
        reasons.push(format!("Specializes in {}", matched_types.join(", ")));
    }

    match contractor.rating {
        Some(rating) if rating >= config.high_rating_threshold => {
            score += config.high_rating_bonus;
            reasons.push("Highly rated".to_string());
        }
        Some(rating) if rating >= config.good_rating_threshold => {
            score += config.good_rating_bonus;
            reasons.push("Well reviewed".to_string());
        }
        _ => {}
    }

    if contractor
        .review_count
        .is_some_and(|count| count >= config.review_count_threshold)
    {
        score += config.review_count_bonus;
        reasons.push("Experienced".to_string());
    }

    (score, reasons)
}
