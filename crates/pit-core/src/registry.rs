use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::config::{PitConfig, MARKER_DIR};
use crate::resolve::{self, RecordKind, ResolveError};
use crate::store::{now_rfc3339, Database, Pit, Project, Store, StoreError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Refusing to index the reserved directory {0}")]
    ForbiddenPath(PathBuf),
    #[error("An active project already tracks {0}")]
    DuplicatePath(PathBuf),
    #[error("A pit needs at least one of group, name, description or location")]
    EmptyPit,
    #[error("Unknown pit group {0:?}; configured groups: {1}")]
    UnknownGroup(String, String),
    #[error("Project path error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Stable taxonomy name reported to the user alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            RegistryError::Resolve(err) => err.code(),
            RegistryError::Store(StoreError::Locked) => "StoreLockedError",
            RegistryError::Store(_) => "IOError",
            RegistryError::ForbiddenPath(_) => "ForbiddenPathError",
            RegistryError::DuplicatePath(_) => "DuplicatePathError",
            RegistryError::EmptyPit => "EmptyPitError",
            RegistryError::UnknownGroup(..) => "InvalidTokenError",
            RegistryError::Io(_) => "IOError",
        }
    }
}

/// Optional fields for `add`/`edit`; only the provided ones are applied.
#[derive(Debug, Clone, Default)]
pub struct PitFields {
    pub group: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
}

impl PitFields {
    pub fn is_empty(&self) -> bool {
        self.group.is_none()
            && self.name.is_none()
            && self.description.is_none()
            && self.location.is_none()
    }
}

/// Business logic over the record store. Every mutating operation is one
/// lock + load + save transaction; reads skip the lock.
pub struct Registry<'a> {
    config: &'a PitConfig,
    store: Store,
    cwd: PathBuf,
}

impl<'a> Registry<'a> {
    pub fn new(config: &'a PitConfig) -> Self {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_cwd(config, cwd)
    }

    pub fn with_cwd(config: &'a PitConfig, cwd: PathBuf) -> Self {
        Self {
            store: Store::open(config),
            config,
            cwd,
        }
    }

    /// Registers `path` as a new project and drops the `.pit` marker into it.
    pub fn init_project(&self, path: &Path) -> Result<Project, RegistryError> {
        let absolute = self.absolutize(path)?;
        self.check_path_allowed(&absolute)?;

        let _guard = self.store.lock()?;
        let mut db = self.store.load()?;
        self.check_path_unclaimed(&db, &absolute, None)?;

        fs::create_dir_all(absolute.join(MARKER_DIR))?;

        let now = now_rfc3339();
        let project = Project {
            id: db.allocate_project_id(),
            name: None,
            path: absolute.to_string_lossy().to_string(),
            active: true,
            pits: Vec::new(),
            next_pit_id: 1,
            created_at: now.clone(),
            updated_at: now,
        };
        db.projects.push(project.clone());
        self.store.save(&db)?;
        debug!("initialized project {} at {}", project.id, project.path);
        Ok(project)
    }

    /// Projects ordered by id, active only unless `include_inactive`.
    pub fn list_projects(&self, include_inactive: bool) -> Result<Vec<Project>, RegistryError> {
        let db = self.store.load()?;
        let mut projects: Vec<Project> = db
            .projects
            .into_iter()
            .filter(|project| include_inactive || project.active)
            .collect();
        projects.sort_by_key(|project| project.id);
        Ok(projects)
    }

    /// Fetches one project by token, without taking the lock.
    pub fn project(&self, token: &str) -> Result<Project, RegistryError> {
        let db = self.store.load()?;
        let id = resolve::resolve_project(&db, token)?;
        Ok(db.project(id).expect("resolved id exists").clone())
    }

    /// Fetches one pit by token, without taking the lock.
    pub fn pit(&self, project: Option<&str>, token: &str) -> Result<Pit, RegistryError> {
        let db = self.store.load()?;
        let id = self.resolve_target(&db, project)?;
        let owner = db.project(id).expect("resolved id exists");
        let pit_id = resolve::resolve_pit(owner, token)?;
        Ok(owner.pit(pit_id).expect("resolved pit exists").clone())
    }

    /// The active project whose path is the CWD or its nearest ancestor.
    pub fn current_project(&self) -> Result<Project, RegistryError> {
        let db = self.store.load()?;
        self.current_in(&db).map(|project| project.clone())
    }

    fn current_in<'db>(&self, db: &'db Database) -> Result<&'db Project, RegistryError> {
        for ancestor in self.cwd.ancestors() {
            if let Some(project) = db
                .projects
                .iter()
                .find(|project| project.active && Path::new(&project.path) == ancestor)
            {
                return Ok(project);
            }
        }
        Err(ResolveError::NotFound {
            kind: RecordKind::Project,
            token: self.cwd.to_string_lossy().to_string(),
        }
        .into())
    }

    /// Partial update; only the provided fields change.
    pub fn update_project(
        &self,
        token: &str,
        new_name: Option<&str>,
        new_path: Option<&Path>,
        toggle_status: bool,
    ) -> Result<Project, RegistryError> {
        let new_path = match new_path {
            Some(path) => {
                let absolute = self.absolutize(path)?;
                self.check_path_allowed(&absolute)?;
                Some(absolute)
            }
            None => None,
        };

        let _guard = self.store.lock()?;
        let mut db = self.store.load()?;
        let id = resolve::resolve_project(&db, token)?;

        if let Some(name) = new_name {
            let taken: Vec<&str> = db
                .projects
                .iter()
                .filter(|project| project.active && project.id != id)
                .filter_map(|project| project.name.as_deref())
                .collect();
            resolve::ensure_unused_name(RecordKind::Project, name, taken)?;
        }
        if let Some(path) = new_path.as_deref() {
            self.check_path_unclaimed(&db, path, Some(id))?;
        }

        let project = db.project_mut(id).expect("resolved id exists");
        if let Some(name) = new_name {
            project.name = Some(name.to_string());
        }
        if let Some(path) = new_path {
            project.path = path.to_string_lossy().to_string();
        }
        if toggle_status {
            project.active = !project.active;
        }
        project.updated_at = now_rfc3339();
        let updated = project.clone();
        self.store.save(&db)?;
        Ok(updated)
    }

    /// Hard-removes the project and all its pits. Irreversible.
    pub fn drop_project(&self, token: &str) -> Result<Project, RegistryError> {
        let _guard = self.store.lock()?;
        let mut db = self.store.load()?;
        let id = resolve::resolve_project(&db, token)?;
        let dropped = db.project(id).expect("resolved id exists").clone();
        db.projects.retain(|project| project.id != id);
        self.store.save(&db)?;
        debug!("dropped project {} ({})", dropped.id, dropped.path);
        Ok(dropped)
    }

    /// Appends a pit to the given project, or to the current one when no
    /// token is supplied.
    pub fn add_pit(
        &self,
        project: Option<&str>,
        fields: PitFields,
    ) -> Result<Pit, RegistryError> {
        if fields.is_empty() {
            return Err(RegistryError::EmptyPit);
        }
        self.check_group(fields.group.as_deref())?;

        let _guard = self.store.lock()?;
        let mut db = self.store.load()?;
        let id = self.resolve_target(&db, project)?;

        if let Some(name) = fields.name.as_deref() {
            let owner = db.project(id).expect("resolved id exists");
            let taken: Vec<&str> = owner.pits.iter().filter_map(|pit| pit.name.as_deref()).collect();
            resolve::ensure_unused_name(RecordKind::Pit, name, taken)?;
        }

        let owner = db.project_mut(id).expect("resolved id exists");
        let now = now_rfc3339();
        let pit = Pit {
            id: owner.allocate_pit_id(),
            group: fields.group,
            name: fields.name,
            description: fields.description,
            location: fields.location,
            created_at: now.clone(),
            updated_at: now.clone(),
        };
        owner.pits.push(pit.clone());
        owner.updated_at = now;
        self.store.save(&db)?;
        Ok(pit)
    }

    /// Applies the provided fields to an existing pit.
    pub fn edit_pit(
        &self,
        project: Option<&str>,
        pit_token: &str,
        fields: PitFields,
    ) -> Result<Pit, RegistryError> {
        self.check_group(fields.group.as_deref())?;

        let _guard = self.store.lock()?;
        let mut db = self.store.load()?;
        let id = self.resolve_target(&db, project)?;
        let owner = db.project(id).expect("resolved id exists");
        let pit_id = resolve::resolve_pit(owner, pit_token)?;

        if let Some(name) = fields.name.as_deref() {
            let taken: Vec<&str> = owner
                .pits
                .iter()
                .filter(|pit| pit.id != pit_id)
                .filter_map(|pit| pit.name.as_deref())
                .collect();
            resolve::ensure_unused_name(RecordKind::Pit, name, taken)?;
        }

        let now = now_rfc3339();
        let owner = db.project_mut(id).expect("resolved id exists");
        owner.updated_at = now.clone();
        let pit = owner.pit_mut(pit_id).expect("resolved pit exists");
        if let Some(group) = fields.group {
            pit.group = Some(group);
        }
        if let Some(name) = fields.name {
            pit.name = Some(name);
        }
        if let Some(description) = fields.description {
            pit.description = Some(description);
        }
        if let Some(location) = fields.location {
            pit.location = Some(location);
        }
        pit.updated_at = now;
        let updated = pit.clone();
        self.store.save(&db)?;
        Ok(updated)
    }

    /// Removes a pit from its project.
    pub fn delete_pit(
        &self,
        project: Option<&str>,
        pit_token: &str,
    ) -> Result<Pit, RegistryError> {
        let _guard = self.store.lock()?;
        let mut db = self.store.load()?;
        let id = self.resolve_target(&db, project)?;
        let owner = db.project(id).expect("resolved id exists");
        let pit_id = resolve::resolve_pit(owner, pit_token)?;

        let owner = db.project_mut(id).expect("resolved id exists");
        let deleted = owner.pit(pit_id).expect("resolved pit exists").clone();
        owner.pits.retain(|pit| pit.id != pit_id);
        owner.updated_at = now_rfc3339();
        self.store.save(&db)?;
        Ok(deleted)
    }

    /// Pits of the project ordered by id, filtered to `groups` when given.
    pub fn list_pits(
        &self,
        project: Option<&str>,
        groups: &[String],
    ) -> Result<Vec<Pit>, RegistryError> {
        for group in groups {
            self.check_group(Some(group))?;
        }
        let db = self.store.load()?;
        let id = self.resolve_target(&db, project)?;
        let owner = db.project(id).expect("resolved id exists");
        let mut pits: Vec<Pit> = owner
            .pits
            .iter()
            .filter(|pit| {
                groups.is_empty()
                    || pit
                        .group
                        .as_deref()
                        .map(|group| groups.iter().any(|wanted| wanted == group))
                        .unwrap_or(false)
            })
            .cloned()
            .collect();
        pits.sort_by_key(|pit| pit.id);
        Ok(pits)
    }

    fn resolve_target(&self, db: &Database, token: Option<&str>) -> Result<u64, RegistryError> {
        match token {
            Some(token) => Ok(resolve::resolve_project(db, token)?),
            None => Ok(self.current_in(db)?.id),
        }
    }

    fn absolutize(&self, path: &Path) -> Result<PathBuf, RegistryError> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        };
        Ok(absolute.canonicalize().unwrap_or(absolute))
    }

    /// The reserved directory, anything inside the pit home, and any
    /// ancestor of the reserved directory can never become a project.
    fn check_path_allowed(&self, path: &Path) -> Result<(), RegistryError> {
        if path == self.config.forbidden
            || path.starts_with(&self.config.home)
            || self.config.forbidden.starts_with(path)
        {
            return Err(RegistryError::ForbiddenPath(path.to_path_buf()));
        }
        Ok(())
    }

    fn check_path_unclaimed(
        &self,
        db: &Database,
        path: &Path,
        except: Option<u64>,
    ) -> Result<(), RegistryError> {
        let claimed = db.projects.iter().any(|project| {
            project.active
                && Some(project.id) != except
                && Path::new(&project.path) == path
        });
        if claimed {
            return Err(RegistryError::DuplicatePath(path.to_path_buf()));
        }
        Ok(())
    }

    fn check_group(&self, group: Option<&str>) -> Result<(), RegistryError> {
        let Some(group) = group else {
            return Ok(());
        };
        if self.config.groups.iter().any(|known| known == group) {
            return Ok(());
        }
        Err(RegistryError::UnknownGroup(
            group.to_string(),
            self.config.groups.join(", "),
        ))
    }
}
