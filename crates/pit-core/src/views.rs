use crate::store::{Pit, Project};

pub fn render_project_line(project: &Project) -> String {
    let name = project.name.as_deref().unwrap_or("-");
    let status = if project.active { "active" } else { "inactive" };
    format!("{} | {} | {} | {}", project.id, name, status, project.path)
}

pub fn render_pit_line(pit: &Pit) -> String {
    let field = |value: &Option<String>| -> String {
        value
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or("-")
            .to_string()
    };
    format!(
        "{} | {} | {} | {} | {}",
        pit.id,
        field(&pit.group),
        field(&pit.name),
        field(&pit.location),
        field(&pit.description)
    )
}
