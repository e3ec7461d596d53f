use shared_types::*;
use std::fs;
use std::path::Path;
use ts_rs::TS;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Generate TypeScript definitions for API types
    let mut types = Vec::new();

    // User types
    types.push(clean_type(UserRole::export_to_string()?));
    types.push(clean_type(User::export_to_string()?));
    types.push(clean_type(CreateUserRequest::export_to_string()?));
    types.push(clean_type(UpdateUserRequest::export_to_string()?));

    // Auth types
    types.push(clean_type(LoginRequest::export_to_string()?));
    types.push(clean_type(LoginResponse::export_to_string()?));

    // Task types
    types.push(clean_type(TaskStatus::export_to_string()?));
    types.push(clean_type(TaskPriority::export_to_string()?));
    types.push(clean_type(Attachment::export_to_string()?));
    types.push(clean_type(ChatMessage::export_to_string()?));
    types.push(clean_type(Task::export_to_string()?));
    types.push(clean_type(CreateTaskRequest::export_to_string()?));
    types.push(clean_type(NewChatMessage::export_to_string()?));
    types.push(clean_type(NewAttachment::export_to_string()?));
    types.push(clean_type(UpdateTaskRequest::export_to_string()?));
    types.push(clean_type(CreateChatMessageRequest::export_to_string()?));

    // Misc
    types.push(clean_type(ErrorResponse::export_to_string()?));
    types.push(clean_type(HealthResponse::export_to_string()?));

    let output_dir = Path::new("../ui/src/api-types");
    fs::create_dir_all(output_dir)?;

    let output_path = output_dir.join("types.ts");
    let output = types.join("\n\n");

    fs::write(&output_path, output)?;
    println!("Generated TypeScript types in {}", output_path.display());

    Ok(())
}

fn clean_type(mut type_def: String) -> String {
    type_def.retain(|c| c != '\r');

    // Every type lands in the same file, so cross-type imports are dropped
    let filtered: Vec<&str> = type_def
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with("import type")
                && !trimmed.starts_with("// This file was generated")
                && !trimmed.starts_with("/* This file was generated")
        })
        .collect();

    let result = filtered.join("\n").trim().to_string();
    if result.is_empty() {
        result
    } else {
        format!("{}\n", result)
    }
}
