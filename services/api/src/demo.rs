use crate::infra::{parse_space, InMemoryDormRepository};
use clap::Args;
use roommate_ai::config::AppConfig;
use roommate_ai::error::AppError;
use roommate_ai::workflows::allocation::{
    AdvisoryBackend, AdvisoryOracle, AdvisoryStatus, AllocationEngine, ApplicantId,
};
use roommate_ai::workflows::dorm::{
    AllocationSummary, DormAllocationService, DormLayout, DormRepository, DormServiceError,
    JoinSubmission,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Tag sets handed out round-robin to the synthetic applicants.
const DEMO_TAGS: [&str; 6] = [
    "quiet early-riser",
    "night-owl gamer",
    "quiet reader",
    "gamer, night-owl",
    "early-riser runner",
    "reader quiet tidy",
];

const DEMO_CREATOR: ApplicantId = ApplicantId(1);

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Number of floors in the demo dorm
    #[arg(long, default_value_t = 2)]
    pub(crate) floors: u32,
    /// Rooms on each floor
    #[arg(long, default_value_t = 3)]
    pub(crate) rooms_per_floor: u32,
    /// Beds per room (2, 4, 6 or 8)
    #[arg(long, default_value_t = 4, value_parser = parse_space)]
    pub(crate) space: u32,
    /// Number of synthetic join requests to allocate
    #[arg(long, default_value_t = 10)]
    pub(crate) applicants: u64,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let backend = AdvisoryBackend::from_config(&config.advisory)?;
    let advisory_label = if backend.is_enabled() {
        "advisory oracle enabled"
    } else {
        "advisory oracle disabled, deterministic packing only"
    };

    let engine = Arc::new(AllocationEngine::new(backend, config.advisory.timeout));
    let repository = Arc::new(InMemoryDormRepository::default());
    let service = DormAllocationService::new(repository, engine);

    println!("Roommate allocation demo ({advisory_label})");
    let summary = seed_and_allocate(&service, &args).await?;
    let names = applicant_names(args.applicants);
    render_summary(&summary, &names);

    let occupancy = service.occupancy(summary.dorm_id)?;
    match serde_json::to_string_pretty(&occupancy) {
        Ok(json) => println!("\nOccupancy map:\n{json}"),
        Err(err) => println!("\nOccupancy map unavailable: {err}"),
    }

    Ok(())
}

async fn seed_and_allocate<R, O>(
    service: &DormAllocationService<R, O>,
    args: &DemoArgs,
) -> Result<AllocationSummary, AppError>
where
    R: DormRepository + 'static,
    O: AdvisoryOracle + 'static,
{
    let layout = DormLayout::new(args.floors, args.rooms_per_floor, args.space)
        .map_err(DormServiceError::from)?;
    let dorm = service.register_dorm("Demo Hall", DEMO_CREATOR, layout)?;
    println!(
        "- Dorm '{}' with {} rooms x {} beds ({} beds total)",
        dorm.name,
        layout.room_count(),
        layout.space,
        layout.bed_count()
    );

    for (offset, tags) in (0..args.applicants).zip(DEMO_TAGS.iter().cycle()) {
        let user_id = demo_user_id(offset);
        service.submit(
            dorm.id,
            JoinSubmission {
                user_id,
                display_name: format!("student-{user_id:03}"),
                tags: tags.to_string(),
            },
        )?;
    }
    println!("- {} join requests pending", service.pending(dorm.id, dorm.creator)?.len());

    Ok(service.allocate(dorm.id).await?)
}

fn demo_user_id(offset: u64) -> u64 {
    DEMO_CREATOR.0 + 1 + offset
}

fn applicant_names(count: u64) -> DemoRoster {
    (0..count)
        .zip(DEMO_TAGS.iter().cycle())
        .map(|(offset, tags)| {
            let user_id = demo_user_id(offset);
            (ApplicantId(user_id), (format!("student-{user_id:03}"), *tags))
        })
        .collect()
}

type DemoRoster = HashMap<ApplicantId, (String, &'static str)>;

fn render_summary(summary: &AllocationSummary, names: &DemoRoster) {
    let advisory = match &summary.advisory {
        AdvisoryStatus::Fallback { reason } => format!("fallback ({reason})"),
        other => other.label().to_string(),
    };
    println!(
        "- Allocation placed {} applicants | advisory: {} | {} corrections",
        summary.placed, advisory, summary.corrections
    );

    for room in &summary.rooms {
        println!("  Room {} ({} new occupants)", room.label, room.applicants.len());
        for applicant in &room.applicants {
            match names.get(applicant) {
                Some((name, tags)) => println!("    - {name} [{tags}]"),
                None => println!("    - applicant {applicant}"),
            }
        }
    }

    if summary.unplaced.is_empty() {
        println!("  Everyone has a bed");
    } else {
        println!("  Waiting for a bed:");
        for applicant in &summary.unplaced {
            println!("    - applicant {applicant}");
        }
    }
}
