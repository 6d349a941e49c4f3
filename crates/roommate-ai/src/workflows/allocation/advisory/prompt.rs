use std::fmt::Write as _;

use super::AdvisoryRequest;

/// Render the request as instructions an agent-style oracle can answer.
pub fn render_prompt(request: &AdvisoryRequest) -> String {
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "Assign the applicants below to rooms. Nominal room capacity is {}.",
        request.nominal_capacity
    );

    prompt.push_str("\nApplicants (id: tags)\n");
    for applicant in &request.applicants {
        let tags = if applicant.tags.is_empty() {
            "(no tags)".to_string()
        } else {
            applicant.tags.join(" ")
        };
        let _ = writeln!(prompt, "- {}: {}", applicant.id, tags);
    }

    prompt.push_str("\nRooms (id, label: free beds / current occupants)\n");
    for room in &request.rooms {
        let _ = writeln!(
            prompt,
            "- {} ({}): {} free / {} occupied",
            room.id, room.label, room.remaining_capacity, room.current_occupants
        );
    }

    prompt.push_str("\nRules\n");
    for rule in &request.policy {
        let _ = writeln!(prompt, "- {rule}");
    }
    prompt.push_str("- never place more applicants in a room than its free beds\n");
    prompt.push_str("- place every applicant at most once\n");

    prompt.push_str(
        "\nReply with a single JSON object and nothing else, mapping room id to an array of \
         applicant ids, for example {\"12\": [3, 7], \"15\": [4, 5]}.\n",
    );

    if let Ok(payload) = serde_json::to_string(request) {
        let _ = writeln!(prompt, "\nStructured request: {payload}");
    }

    prompt
}
