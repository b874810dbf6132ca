// src/query/executor.rs
//! Executes a parsed document against the static job schema.
//!
//! Root type `RootQuery { jobs: [Job], job(id: Int): Job }`. Field errors are
//! collected next to the data instead of aborting: a failing field becomes null
//! (root fields) or is left out (unknown fields), and its siblings still resolve.

use super::engine::QueryEngine;
use super::parser::{Directive, Document, Field, Operation, OperationKind, ParseError, Pos, TypeRef, Value};
use crate::dataset::{JobRecord, SnapshotSource};
use serde::Serialize;
use serde_json::{Map, Number, Value as Json};
use std::collections::HashSet;
use tracing::debug;

pub const ROOT_TYPE: &str = "RootQuery";
pub const JOB_TYPE: &str = "Job";

const JOBS_ARGUMENTS: &[&str] = &[];
const JOB_ARGUMENTS: &[&str] = &["id"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryError {
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Pos>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<Json>,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            locations: Vec::new(),
            path: Vec::new(),
        }
    }

    fn at(mut self, pos: Pos) -> Self {
        self.locations.push(pos);
        self
    }

    fn with_path(mut self, path: &[&str]) -> Self {
        self.path = path.iter().map(|key| Json::from(*key)).collect();
        self
    }
}

impl From<ParseError> for QueryError {
    fn from(err: ParseError) -> Self {
        QueryError::new(format!("Syntax Error: {}", err.message)).at(err.pos)
    }
}

/// The `{"data": ..., "errors": [...]}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub data: Option<Json>,
    pub errors: Vec<QueryError>,
}

impl QueryResponse {
    pub fn failed(errors: Vec<QueryError>) -> Self {
        Self { data: None, errors }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobField {
    Id,
    Position,
    Company,
    Description,
    SkillsRequired,
    Location,
    EmploymentType,
    Typename,
}

impl JobField {
    fn from_name(name: &str) -> Option<Self> {
        let field = match name {
            "id" => JobField::Id,
            "position" => JobField::Position,
            "company" => JobField::Company,
            "description" => JobField::Description,
            "skillsRequired" => JobField::SkillsRequired,
            "location" => JobField::Location,
            "employmentType" => JobField::EmploymentType,
            "__typename" => JobField::Typename,
            _ => return None,
        };
        Some(field)
    }

    fn type_name(self) -> &'static str {
        match self {
            JobField::Id => "Int",
            JobField::SkillsRequired => "[String]",
            JobField::Typename => "String!",
            _ => "String",
        }
    }

    fn resolve(self, job: &JobRecord) -> Json {
        match self {
            JobField::Id => Json::from(job.id),
            JobField::Position => Json::from(job.position.as_str()),
            JobField::Company => Json::from(job.company.as_str()),
            JobField::Description => Json::from(job.description.as_str()),
            JobField::SkillsRequired => Json::from(job.skills_required.clone()),
            JobField::Location => Json::from(job.location.as_str()),
            JobField::EmploymentType => Json::from(job.employment_type.as_str()),
            JobField::Typename => Json::from(JOB_TYPE),
        }
    }
}

type Columns = Vec<(String, JobField)>;

enum RootField {
    ListAll(Columns),
    GetById(Option<i64>, Columns),
}

/// Run the selected operation of `document`. The snapshot is loaded at most once.
pub fn execute(
    document: &Document,
    operation_name: Option<&str>,
    variables: &Map<String, Json>,
    source: &dyn SnapshotSource,
) -> QueryResponse {
    let operation = match select_operation(document, operation_name) {
        Ok(operation) => operation,
        Err(err) => return QueryResponse::failed(vec![err]),
    };

    let kind = match operation.kind {
        OperationKind::Query => None,
        OperationKind::Mutation => Some("mutations"),
        OperationKind::Subscription => Some("subscriptions"),
    };
    if let Some(kind) = kind {
        return QueryResponse::failed(vec![
            QueryError::new(format!("Schema is not configured for {}.", kind)).at(operation.pos),
        ]);
    }

    let mut executor = match Executor::new(operation, variables) {
        Ok(executor) => executor,
        Err(errors) => return QueryResponse::failed(errors),
    };

    let data = executor.root(&operation.selection, source);
    QueryResponse {
        data: Some(Json::Object(data)),
        errors: executor.errors,
    }
}

fn select_operation<'d>(
    document: &'d Document,
    operation_name: Option<&str>,
) -> Result<&'d Operation, QueryError> {
    match operation_name {
        Some(name) => document
            .operations
            .iter()
            .find(|op| op.name.as_deref() == Some(name))
            .ok_or_else(|| QueryError::new(format!("Unknown operation named \"{}\".", name))),
        None => match document.operations.as_slice() {
            [operation] => Ok(operation),
            _ => Err(QueryError::new(
                "Must provide operation name if query contains multiple operations.",
            )),
        },
    }
}

struct Executor {
    variables: Map<String, Json>,
    defined: HashSet<String>,
    errors: Vec<QueryError>,
}

impl Executor {
    fn new(operation: &Operation, provided: &Map<String, Json>) -> Result<Self, Vec<QueryError>> {
        let mut variables = Map::new();
        let mut defined = HashSet::new();
        let mut errors = Vec::new();

        for definition in &operation.variables {
            defined.insert(definition.name.clone());

            let base = base_type(&definition.var_type);
            if !matches!(base, "Int" | "Float" | "String" | "Boolean" | "ID") {
                errors.push(QueryError::new(format!("Unknown type \"{}\".", base)).at(definition.pos));
                continue;
            }

            let value = provided
                .get(&definition.name)
                .cloned()
                .or_else(|| definition.default.as_ref().map(literal_to_json));

            match value {
                None | Some(Json::Null) if matches!(definition.var_type, TypeRef::NonNull(_)) => {
                    errors.push(
                        QueryError::new(format!(
                            "Variable \"${}\" of required type \"{}\" was not provided.",
                            definition.name, definition.var_type
                        ))
                        .at(definition.pos),
                    );
                }
                Some(value) if !value.is_null() && !accepts(&definition.var_type, &value) => {
                    errors.push(
                        QueryError::new(format!(
                            "Variable \"${}\" got invalid value {}.\nExpected type \"{}\".",
                            definition.name, value, definition.var_type
                        ))
                        .at(definition.pos),
                    );
                }
                Some(value) => {
                    variables.insert(definition.name.clone(), value);
                }
                None => {}
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Self {
            variables,
            defined,
            errors: Vec::new(),
        })
    }

    fn root(&mut self, selection: &[Field], source: &dyn SnapshotSource) -> Map<String, Json> {
        let mut data = Map::new();
        let mut snapshot: Option<Result<Vec<JobRecord>, String>> = None;

        for (key, fields) in self.group_by_key(selection) {
            if !self.check_mergeable(key, &fields) {
                continue;
            }
            let Some(&field) = fields.first() else {
                continue;
            };

            let value = match field.name.as_str() {
                "__typename" => Json::from(ROOT_TYPE),
                "jobs" | "job" => match self.prepare_root_field(&fields) {
                    None => Json::Null,
                    Some(plan) => {
                        let loaded = snapshot
                            .get_or_insert_with(|| source.load().map_err(|err| err.to_string()));
                        match loaded {
                            Ok(jobs) => resolve_root_field(plan, QueryEngine::new(jobs.as_slice())),
                            Err(message) => {
                                self.errors.push(
                                    QueryError::new(message.clone())
                                        .at(field.pos)
                                        .with_path(&[key]),
                                );
                                Json::Null
                            }
                        }
                    }
                },
                _ => {
                    for field in &fields {
                        self.unknown_field(field, ROOT_TYPE, &[key]);
                    }
                    continue;
                }
            };

            data.insert(key.to_string(), value);
        }

        data
    }

    /// Included fields grouped by response key, in order of first appearance.
    fn group_by_key<'f>(
        &mut self,
        selection: impl IntoIterator<Item = &'f Field>,
    ) -> Vec<(&'f str, Vec<&'f Field>)> {
        let mut groups: Vec<(&'f str, Vec<&'f Field>)> = Vec::new();
        for field in selection {
            if !self.is_included(&field.directives) {
                continue;
            }
            let key = field.response_key();
            match groups.iter_mut().find(|(existing, _)| *existing == key) {
                Some((_, fields)) => fields.push(field),
                None => groups.push((key, vec![field])),
            }
        }
        groups
    }

    /// Fields sharing a response key merge only when they name the same field with the same arguments.
    fn check_mergeable(&mut self, key: &str, fields: &[&Field]) -> bool {
        let Some((first, rest)) = fields.split_first() else {
            return true;
        };

        for other in rest {
            let reason = if other.name != first.name {
                format!("\"{}\" and \"{}\" are different fields", first.name, other.name)
            } else if !same_arguments(&first.arguments, &other.arguments) {
                "they have differing arguments".to_string()
            } else {
                continue;
            };

            self.errors.push(
                QueryError::new(format!(
                    "Fields \"{}\" conflict because {}. Use different aliases on the fields to fetch both if this was intentional.",
                    key, reason
                ))
                .at(first.pos)
                .at(other.pos),
            );
            return false;
        }
        true
    }

    fn unknown_field(&mut self, field: &Field, parent_type: &str, path: &[&str]) {
        self.errors.push(
            QueryError::new(format!(
                "Cannot query field \"{}\" on type \"{}\".",
                field.name, parent_type
            ))
            .at(field.pos)
            .with_path(path),
        );
    }

    /// Validates arguments and the merged sub-selection of a root field. `None` means the field resolves to null.
    fn prepare_root_field(&mut self, fields: &[&Field]) -> Option<RootField> {
        let &field = fields.first()?;
        let key = field.response_key();
        let (allowed, type_name) = if field.name == "jobs" {
            (JOBS_ARGUMENTS, "[Job]")
        } else {
            (JOB_ARGUMENTS, "Job")
        };

        if !self.check_arguments(field, allowed, ROOT_TYPE, &[key]) {
            return None;
        }

        if let Some(bare) = fields.iter().find(|f| f.selection.is_none()) {
            self.errors.push(
                QueryError::new(format!(
                    "Field \"{}\" of type \"{}\" must have a selection of subfields. Did you mean \"{} {{ ... }}\"?",
                    field.name, type_name, field.name
                ))
                .at(bare.pos)
                .with_path(&[key]),
            );
            return None;
        }

        let selection = fields
            .iter()
            .copied()
            .flat_map(|f| f.selection.iter().flatten());

        if field.name == "jobs" {
            let columns = self.plan_job_selection(key, selection);
            return Some(RootField::ListAll(columns));
        }

        let id = match self.int_argument(field, "id") {
            Ok(id) => id,
            Err(err) => {
                self.errors.push(err.with_path(&[key]));
                return None;
            }
        };
        let columns = self.plan_job_selection(key, selection);
        Some(RootField::GetById(id, columns))
    }

    fn plan_job_selection<'f>(
        &mut self,
        parent: &str,
        selection: impl IntoIterator<Item = &'f Field>,
    ) -> Columns {
        let groups = self.group_by_key(selection);
        let mut columns = Vec::with_capacity(groups.len());

        for (key, fields) in groups {
            if !self.check_mergeable(key, &fields) {
                continue;
            }

            let mut column = None;
            for field in fields {
                let Some(job_field) = JobField::from_name(&field.name) else {
                    self.unknown_field(field, JOB_TYPE, &[parent, key]);
                    continue;
                };

                if field.selection.is_some() {
                    self.errors.push(
                        QueryError::new(format!(
                            "Field \"{}\" must not have a selection since type \"{}\" has no subfields.",
                            field.name,
                            job_field.type_name()
                        ))
                        .at(field.pos)
                        .with_path(&[parent, key]),
                    );
                    continue;
                }

                self.check_arguments(field, &[], JOB_TYPE, &[parent, key]);
                column = Some(job_field);
            }

            if let Some(job_field) = column {
                columns.push((key.to_string(), job_field));
            }
        }

        debug!("Planned {} job columns", columns.len());
        columns
    }

    fn check_arguments(
        &mut self,
        field: &Field,
        allowed: &[&str],
        parent_type: &str,
        path: &[&str],
    ) -> bool {
        let mut valid = true;
        for (name, _) in &field.arguments {
            if !allowed.contains(&name.as_str()) {
                self.errors.push(
                    QueryError::new(format!(
                        "Unknown argument \"{}\" on field \"{}\" of type \"{}\".",
                        name, field.name, parent_type
                    ))
                    .at(field.pos)
                    .with_path(path),
                );
                valid = false;
            }
        }
        valid
    }

    fn variable(&self, name: &str, pos: Pos) -> Result<Json, QueryError> {
        if !self.defined.contains(name) {
            return Err(QueryError::new(format!("Variable \"${}\" is not defined.", name)).at(pos));
        }
        Ok(self.variables.get(name).cloned().unwrap_or(Json::Null))
    }

    fn int_argument(&self, field: &Field, name: &str) -> Result<Option<i64>, QueryError> {
        let Some(value) = field.argument(name) else {
            return Ok(None);
        };

        match value {
            Value::Null => Ok(None),
            Value::Int(n) if fits_int(*n) => Ok(Some(*n)),
            Value::Variable(var) => match self.variable(var, field.pos)? {
                Json::Null => Ok(None),
                Json::Number(n) if n.as_i64().is_some_and(fits_int) => Ok(n.as_i64()),
                other => Err(QueryError::new(format!(
                    "Variable \"${}\" got invalid value {}.\nExpected type \"Int\".",
                    var, other
                ))
                .at(field.pos)),
            },
            other => Err(QueryError::new(format!(
                "Argument \"{}\" has invalid value {}.\nExpected type \"Int\", found {}.",
                name, other, other
            ))
            .at(field.pos)),
        }
    }

    /// `@skip` / `@include` evaluation. Errors exclude the field.
    fn is_included(&mut self, directives: &[Directive]) -> bool {
        for directive in directives {
            let skip_when = match directive.name.as_str() {
                "skip" => true,
                "include" => false,
                other => {
                    self.errors.push(
                        QueryError::new(format!("Unknown directive \"{}\".", other)).at(directive.pos),
                    );
                    return false;
                }
            };

            match self.directive_condition(directive) {
                Ok(condition) if condition == skip_when => return false,
                Ok(_) => {}
                Err(err) => {
                    self.errors.push(err);
                    return false;
                }
            }
        }
        true
    }

    fn directive_condition(&self, directive: &Directive) -> Result<bool, QueryError> {
        let value = directive
            .arguments
            .iter()
            .find(|(name, _)| name == "if")
            .map(|(_, value)| value);

        let resolved = match value {
            None => Json::Null,
            Some(Value::Variable(var)) => self.variable(var, directive.pos)?,
            Some(literal) => literal_to_json(literal),
        };

        resolved.as_bool().ok_or_else(|| {
            QueryError::new(format!(
                "Directive \"@{}\" argument \"if\" of type \"Boolean!\" is required but not provided.",
                directive.name
            ))
            .at(directive.pos)
        })
    }
}

fn resolve_root_field(plan: RootField, engine: QueryEngine<'_>) -> Json {
    match plan {
        RootField::ListAll(columns) => Json::Array(
            engine
                .list_all()
                .iter()
                .map(|job| render_job(job, &columns))
                .collect(),
        ),
        RootField::GetById(Some(id), columns) => engine
            .get_by_id(id)
            .map(|job| render_job(job, &columns))
            .unwrap_or(Json::Null),
        RootField::GetById(None, _) => Json::Null,
    }
}

fn render_job(job: &JobRecord, columns: &Columns) -> Json {
    let mut object = Map::new();
    for (key, field) in columns {
        object.insert(key.clone(), field.resolve(job));
    }
    Json::Object(object)
}

/// Argument lists compare without regard to order.
fn same_arguments(left: &[(String, Value)], right: &[(String, Value)]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .all(|(name, value)| right.iter().any(|(n, v)| n == name && v == value))
}

fn fits_int(n: i64) -> bool {
    i32::try_from(n).is_ok()
}

fn base_type(var_type: &TypeRef) -> &str {
    match var_type {
        TypeRef::Named(name) => name,
        TypeRef::List(inner) | TypeRef::NonNull(inner) => base_type(inner),
    }
}

fn accepts(var_type: &TypeRef, value: &Json) -> bool {
    match var_type {
        TypeRef::NonNull(inner) => !value.is_null() && accepts(inner, value),
        TypeRef::List(inner) => match value {
            Json::Array(items) => items.iter().all(|item| item.is_null() || accepts(inner, item)),
            single => accepts(inner, single),
        },
        TypeRef::Named(name) => match name.as_str() {
            "Int" => value.as_i64().is_some_and(fits_int),
            "Float" => value.is_number(),
            "String" => value.is_string(),
            "ID" => value.is_string() || value.is_i64(),
            "Boolean" => value.is_boolean(),
            _ => false,
        },
    }
}

fn literal_to_json(value: &Value) -> Json {
    match value {
        Value::Int(n) => Json::from(*n),
        Value::Float(n) => Number::from_f64(*n).map(Json::Number).unwrap_or(Json::Null),
        Value::String(s) | Value::Enum(s) => Json::String(s.clone()),
        Value::Boolean(b) => Json::Bool(*b),
        Value::Null | Value::Variable(_) => Json::Null,
        Value::List(items) => Json::Array(items.iter().map(literal_to_json).collect()),
        Value::Object(fields) => Json::Object(
            fields
                .iter()
                .map(|(name, value)| (name.clone(), literal_to_json(value)))
                .collect(),
        ),
    }
}
