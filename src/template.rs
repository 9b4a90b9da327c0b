//! SQL view templates using nom.
//!
//! A template is plain SQL with `${name}` placeholders. `$$` is a literal
//! dollar sign. Placeholder names are checked when the template is parsed,
//! so a typo fails before any view is rendered.
//!
//! ```text
//! SELECT * FROM `${source_project}.${source_dataset}.${source_table}`
//! ─────┬──────── ─────────────────────────┬──────────────────────────
//!      │                                  └── Placeholders
//!      └── Literal
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{map, not, value},
    sequence::{delimited, terminated},
    IResult,
};

use crate::builder::ResolvedView;
use crate::error::{ViewError, ViewResult};

/// The template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = "SELECT
  *
FROM
  `${source_project}.${source_dataset}.${source_table}`
WHERE
  DATE(${date_column}) BETWEEN ${start_date} AND ${end_date}${filter_clause}${additional_clause}";

/// Trait for rendering resolved views to SQL.
pub trait ToSql {
    /// Render with the default template.
    fn to_sql(&self) -> String;
}

impl ToSql for ResolvedView {
    fn to_sql(&self) -> String {
        SqlTemplate::default().render(self)
    }
}

/// Values a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    SourceProject,
    SourceDataset,
    SourceTable,
    /// The raw combined predicate.
    FilterConditions,
    /// `\n  AND (<predicate>)`, or nothing when there are no filters.
    FilterClause,
    AdditionalWhere,
    /// `\n  AND (<extra>)`, or nothing.
    AdditionalClause,
    StartDate,
    EndDate,
    DateColumn,
    MonthsBack,
    TargetDataset,
    ViewName,
}

impl Placeholder {
    pub const ALL: [Placeholder; 13] = [
        Placeholder::SourceProject,
        Placeholder::SourceDataset,
        Placeholder::SourceTable,
        Placeholder::FilterConditions,
        Placeholder::FilterClause,
        Placeholder::AdditionalWhere,
        Placeholder::AdditionalClause,
        Placeholder::StartDate,
        Placeholder::EndDate,
        Placeholder::DateColumn,
        Placeholder::MonthsBack,
        Placeholder::TargetDataset,
        Placeholder::ViewName,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Placeholder::SourceProject => "source_project",
            Placeholder::SourceDataset => "source_dataset",
            Placeholder::SourceTable => "source_table",
            Placeholder::FilterConditions => "filter_conditions",
            Placeholder::FilterClause => "filter_clause",
            Placeholder::AdditionalWhere => "additional_where",
            Placeholder::AdditionalClause => "additional_clause",
            Placeholder::StartDate => "start_date",
            Placeholder::EndDate => "end_date",
            Placeholder::DateColumn => "date_column",
            Placeholder::MonthsBack => "months_back",
            Placeholder::TargetDataset => "target_dataset",
            Placeholder::ViewName => "view_name",
        }
    }

    /// The substituted text for one view. Substitution is verbatim.
    fn value(&self, view: &ResolvedView) -> String {
        match self {
            Placeholder::SourceProject => view.source_project.clone(),
            Placeholder::SourceDataset => view.source_dataset.clone(),
            Placeholder::SourceTable => view.source_table.clone(),
            Placeholder::FilterConditions => view.filter_predicate.clone(),
            Placeholder::FilterClause => and_clause(&view.filter_predicate),
            Placeholder::AdditionalWhere => view.additional_where.clone().unwrap_or_default(),
            Placeholder::AdditionalClause => {
                and_clause(view.additional_where.as_deref().unwrap_or_default())
            }
            Placeholder::StartDate => view.date_range.start_expr.clone(),
            Placeholder::EndDate => view.date_range.end_expr.clone(),
            Placeholder::DateColumn => view.date_column.clone(),
            Placeholder::MonthsBack => view.date_range.months_back.to_string(),
            Placeholder::TargetDataset => view.target_dataset_id.clone(),
            Placeholder::ViewName => view.view_name.clone(),
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}}}", self.name())
    }
}

impl FromStr for Placeholder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Placeholder::ALL
            .iter()
            .copied()
            .find(|p| p.name() == s)
            .ok_or_else(|| format!("Unknown placeholder '{}'", s))
    }
}

/// Wrap a predicate in parentheses so an OR inside it cannot escape the
/// date bound.
fn and_clause(predicate: &str) -> String {
    if predicate.trim().is_empty() {
        String::new()
    } else {
        format!("\n  AND ({})", predicate.trim())
    }
}

/// One piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// A parsed SQL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTemplate {
    segments: Vec<Segment>,
}

impl Default for SqlTemplate {
    fn default() -> Self {
        // The built-in template only uses known placeholders.
        Self::parse(DEFAULT_TEMPLATE).unwrap_or_else(|_| Self {
            segments: vec![Segment::Literal(DEFAULT_TEMPLATE.to_string())],
        })
    }
}

impl SqlTemplate {
    /// Parse a template string.
    pub fn parse(input: &str) -> ViewResult<Self> {
        let mut segments: Vec<Segment> = Vec::new();
        let mut remaining = input;

        while !remaining.is_empty() {
            let position = input.len() - remaining.len();
            let (rest, raw) = match parse_segment(remaining) {
                Ok(ok) => ok,
                Err(_) => {
                    return Err(ViewError::template(
                        position,
                        format!("Unterminated placeholder: '{}'", preview(remaining)),
                    ));
                }
            };

            let segment = match raw {
                RawSegment::Text(text) => Segment::Literal(text.to_string()),
                RawSegment::Name(name) => Segment::Placeholder(
                    name.parse::<Placeholder>()
                        .map_err(|msg: String| ViewError::template(position, msg))?,
                ),
            };

            // Merge adjacent literals so `$$` does not split the text.
            let merged = match (&segment, segments.last_mut()) {
                (Segment::Literal(text), Some(Segment::Literal(prev))) => {
                    prev.push_str(text);
                    true
                }
                _ => false,
            };
            if !merged {
                segments.push(segment);
            }
            remaining = rest;
        }

        Ok(Self { segments })
    }

    /// Load a template from a file.
    pub fn load(path: impl AsRef<Path>) -> ViewResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Placeholders referenced by this template, in order of appearance.
    pub fn placeholders(&self) -> Vec<Placeholder> {
        let mut found: Vec<Placeholder> = Vec::new();
        for seg in &self.segments {
            if let Segment::Placeholder(p) = seg {
                if !found.contains(p) {
                    found.push(*p);
                }
            }
        }
        found
    }

    /// Substitute a view's values into the template.
    pub fn render(&self, view: &ResolvedView) -> String {
        let mut sql = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => sql.push_str(text),
                Segment::Placeholder(p) => sql.push_str(&p.value(view)),
            }
        }
        sql
    }
}

#[derive(Clone)]
enum RawSegment<'a> {
    Text(&'a str),
    Name(&'a str),
}

/// Parse one segment: `$$`, `${name}`, a bare `$`, or text up to the next `$`.
fn parse_segment(input: &str) -> IResult<&str, RawSegment<'_>> {
    alt((
        value(RawSegment::Text("$"), tag("$$")),
        map(
            delimited(
                tag("${"),
                delimited(multispace0, parse_identifier, multispace0),
                char('}'),
            ),
            RawSegment::Name,
        ),
        map(terminated(tag("$"), not(char('{'))), RawSegment::Text),
        map(take_while1(|c: char| c != '$'), RawSegment::Text),
    ))(input)
}

/// Parse a placeholder name.
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

fn preview(s: &str) -> String {
    s.chars().take(24).collect()
}
