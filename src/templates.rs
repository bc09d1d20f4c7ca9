use maud::{DOCTYPE, Markup, html};

use crate::{
    catalog::{self, Input, InputKind, Operation, Params, Section},
    error::AppResult,
    outcome::{Level, Outcome, Point},
};

const TAILWIND_CDN: &str = "https://cdn.tailwindcss.com";
const ACTOR_LIST_ID: &str = "actor-names";
const DIRECTOR_LIST_ID: &str = "director-names";

/// Names offered in the actor and director pickers.
#[derive(Debug, Default)]
pub struct Choices {
    pub actors: Vec<String>,
    pub directors: Vec<String>,
    pub warning: Option<String>,
}

/// The operation that was just run and what it returned.
pub struct Panel<'a> {
    pub operation: &'a Operation,
    pub result: &'a AppResult<Outcome>,
}

pub fn section_page(
    section: Section,
    choices: &Choices,
    params: &Params,
    panel: Option<Panel<'_>>,
) -> String {
    // Only the form that produced the panel keeps the submitted values.
    let active = panel.as_ref().map(|p| p.operation.id);
    page(
        section.title(),
        html! {
            div class="min-h-screen bg-gray-50 flex" {
                (sidebar(section))
                main class="flex-1 px-8 py-10 max-w-5xl" {
                    h1 class="text-3xl font-bold text-gray-900" { (section.title()) }

                    @if let Some(warning) = &choices.warning {
                        (message(Level::Warning, warning))
                    }

                    @if let Some(panel) = panel {
                        (result_panel(&panel, params))
                    }

                    datalist id=(ACTOR_LIST_ID) {
                        @for name in &choices.actors { option value=(name) {} }
                    }
                    datalist id=(DIRECTOR_LIST_ID) {
                        @for name in &choices.directors { option value=(name) {} }
                    }

                    div class="mt-8 grid gap-4 md:grid-cols-2" {
                        @for op in catalog::in_section(section) {
                            (operation_form(op, (Some(op.id) == active).then_some(params)))
                        }
                    }
                }
            }
        },
    )
}

pub fn error_page(message: String) -> String {
    page(
        "Error",
        html! {
            div class="min-h-screen bg-gray-50 flex items-center justify-center" {
                div class="max-w-xl w-full px-6" {
                    div class="bg-white shadow rounded-lg p-8" {
                        h1 class="text-2xl font-bold text-gray-900" { "Error" }
                        p class="mt-4 text-gray-700" { (message) }
                        a class="mt-6 inline-block text-blue-600 hover:text-blue-800" href="/" { "Back" }
                    }
                }
            }
        },
    )
}

fn page(title: &str, body: Markup) -> String {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " · cinegraph" }
                script src=(TAILWIND_CDN) {}
            }
            body { (body) }
        }
    }
    .into_string()
}

fn sidebar(current: Section) -> Markup {
    html! {
        nav class="w-64 shrink-0 bg-white border-r border-gray-200 px-6 py-10" {
            p class="text-lg font-bold text-gray-900" { "cinegraph" }
            p class="mt-1 text-xs text-gray-500" { "MongoDB & Neo4j explorer" }
            ul class="mt-8 space-y-2" {
                @for section in Section::ALL {
                    li {
                        @if section == current {
                            span class="block rounded-md bg-blue-50 px-3 py-2 text-sm font-semibold text-blue-700" {
                                (section.title())
                            }
                        } @else {
                            a class="block rounded-md px-3 py-2 text-sm text-gray-700 hover:bg-gray-100"
                                href=(format!("/?section={}", section.slug())) {
                                (section.title())
                            }
                        }
                    }
                }
            }
        }
    }
}

fn operation_form(op: &Operation, submitted: Option<&Params>) -> Markup {
    html! {
        form class="bg-white shadow rounded-lg p-4 space-y-3" method="get" action=(format!("/run/{}", op.id)) {
            @for input in op.inputs {
                (input_field(op, input, submitted))
            }
            button class="w-full rounded-md bg-blue-600 px-4 py-2 text-sm font-semibold text-white hover:bg-blue-700" type="submit" {
                (op.label)
            }
        }
    }
}

fn input_field(op: &Operation, input: &Input, submitted: Option<&Params>) -> Markup {
    let field_id = format!("{}-{}", op.id, input.name);
    let value = submitted.and_then(|p| p.get(input.name));
    html! {
        div {
            label class="block text-xs font-medium text-gray-600" for=(field_id) { (input.label) }
            @match input.kind {
                InputKind::Actor => {
                    input class="mt-1 w-full rounded-md border border-gray-300 px-3 py-1 text-sm"
                        id=(field_id) name=(input.name) list=(ACTOR_LIST_ID) required
                        value=[value];
                },
                InputKind::Director => {
                    input class="mt-1 w-full rounded-md border border-gray-300 px-3 py-1 text-sm"
                        id=(field_id) name=(input.name) list=(DIRECTOR_LIST_ID) required
                        value=[value];
                },
                InputKind::Number { default, min } => {
                    input class="mt-1 w-full rounded-md border border-gray-300 px-3 py-1 text-sm"
                        id=(field_id) type="number" name=(input.name) min=(min)
                        value=(value.map(str::to_string).unwrap_or_else(|| default.to_string()));
                },
            }
        }
    }
}

fn result_panel(panel: &Panel<'_>, params: &Params) -> Markup {
    let json_href = match params.query_string() {
        q if q.is_empty() => format!("/api/run/{}", panel.operation.id),
        q => format!("/api/run/{}?{}", panel.operation.id, q),
    };
    html! {
        section class="mt-6 bg-white shadow rounded-lg p-6" {
            div class="flex items-start justify-between gap-4" {
                h2 class="text-lg font-semibold text-gray-900" { (panel.operation.label) }
                a class="text-xs text-blue-600 hover:text-blue-800" href=(json_href) { "JSON" }
            }
            div class="mt-4" {
                @match panel.result {
                    Ok(outcome) => (render_outcome(outcome)),
                    Err(err) => div class="rounded-md border-l-4 border-red-500 bg-red-50 p-4 text-sm text-red-800" {
                        (err.display_message())
                    },
                }
            }
        }
    }
}

fn message(level: Level, text: &str) -> Markup {
    let style = match level {
        Level::Success => "border-green-500 bg-green-50 text-green-800",
        Level::Info => "border-blue-500 bg-blue-50 text-blue-800",
        Level::Warning => "border-yellow-500 bg-yellow-50 text-yellow-800",
    };
    html! {
        div class=(format!("mt-4 rounded-md border-l-4 p-4 text-sm {style}")) { (text) }
    }
}

pub fn render_outcome(outcome: &Outcome) -> Markup {
    match outcome {
        Outcome::Message { level, text } => message(*level, text),
        Outcome::List { items } => html! {
            ul class="list-disc pl-6 text-sm text-gray-700 space-y-1" {
                @for item in items { li { (item) } }
            }
        },
        Outcome::Table { columns, rows } => html! {
            table class="min-w-full text-sm" {
                thead {
                    tr {
                        @for column in columns {
                            th class="border-b px-3 py-2 text-left font-semibold text-gray-700" { (column) }
                        }
                    }
                }
                tbody {
                    @for row in rows {
                        tr {
                            @for cell in row { td class="border-b px-3 py-1 text-gray-700" { (cell) } }
                        }
                    }
                }
            }
        },
        Outcome::Bars { points } => bar_chart(points),
        Outcome::Line { points } => line_chart(points),
        Outcome::Groups { groups } => html! {
            div class="space-y-4" {
                @for group in groups {
                    div {
                        h3 class="text-sm font-semibold text-gray-900" { (group.heading) }
                        ul class="mt-1 list-disc pl-6 text-sm text-gray-700" {
                            @for item in &group.items { li { (item) } }
                        }
                    }
                }
            }
        },
        Outcome::Record { heading, fields } => html! {
            div {
                h3 class="text-sm font-semibold text-gray-900" { (heading) }
                dl class="mt-2 grid grid-cols-3 gap-x-4 gap-y-1 text-sm" {
                    @for (key, value) in fields {
                        dt class="text-gray-500" { (key) }
                        dd class="col-span-2 text-gray-800" { (value) }
                    }
                }
            }
        },
        Outcome::Path { nodes } => html! {
            p class="text-sm text-gray-800" {
                @for (i, node) in nodes.iter().enumerate() {
                    @if i > 0 { span class="mx-2 text-gray-400" { "→" } }
                    span class=(if i % 2 == 0 { "font-semibold" } else { "italic" }) { (node) }
                }
            }
        },
        Outcome::Many { parts } => html! {
            div class="space-y-6" {
                @for part in parts { (render_outcome(part)) }
            }
        },
    }
}

fn bar_chart(points: &[Point]) -> Markup {
    let max = points.iter().map(|p| p.value).fold(0.0_f64, f64::max);
    html! {
        div class="space-y-1" {
            @for point in points {
                div class="flex items-center gap-2 text-xs" {
                    span class="w-12 text-right text-gray-600" { (point.label) }
                    div class="flex-1 bg-gray-100 rounded" {
                        div class="h-3 rounded bg-blue-500" style=(format!("width: {:.1}%", percent(point.value, max))) {}
                    }
                    span class="w-12 text-gray-700" { (point.value) }
                }
            }
        }
    }
}

const CHART_WIDTH: f64 = 600.0;
const CHART_HEIGHT: f64 = 200.0;
const CHART_PAD: f64 = 30.0;

fn line_chart(points: &[Point]) -> Markup {
    let coords = chart_coords(points);
    let polyline = coords.iter().map(|(x, y)| format!("{x:.1},{y:.1}")).collect::<Vec<_>>().join(" ");
    html! {
        svg class="w-full" viewBox=(format!("0 0 {CHART_WIDTH} {}", CHART_HEIGHT + CHART_PAD)) {
            polyline fill="none" stroke="#2563eb" stroke-width="2" points=(polyline) {}
            @for ((x, y), point) in coords.iter().zip(points) {
                circle cx=(format!("{x:.1}")) cy=(format!("{y:.1}")) r="3" fill="#2563eb" {}
                text x=(format!("{x:.1}")) y=(format!("{:.1}", CHART_HEIGHT + CHART_PAD - 8.0))
                    font-size="10" text-anchor="middle" fill="#4b5563" { (point.label) }
                text x=(format!("{x:.1}")) y=(format!("{:.1}", y - 8.0))
                    font-size="10" text-anchor="middle" fill="#111827" { (format!("{:.1}", point.value)) }
            }
        }
    }
}

fn percent(value: f64, max: f64) -> f64 {
    if max <= 0.0 { 0.0 } else { (value / max * 100.0).clamp(0.0, 100.0) }
}

/// Points spread evenly on x, scaled between the min and max value on y.
fn chart_coords(points: &[Point]) -> Vec<(f64, f64)> {
    let min = points.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
    let max = points.iter().map(|p| p.value).fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min { max - min } else { 1.0 };
    let step = if points.len() > 1 {
        (CHART_WIDTH - 2.0 * CHART_PAD) / (points.len() - 1) as f64
    } else {
        0.0
    };
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let x = CHART_PAD + step * i as f64;
            let y = CHART_PAD + (1.0 - (p.value - min) / span) * (CHART_HEIGHT - 2.0 * CHART_PAD);
            (x, y)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(label: &str, value: f64) -> Point {
        Point { label: label.to_string(), value }
    }

    #[test]
    fn chart_spans_the_padded_area() {
        let coords = chart_coords(&[point("1990", 100.0), point("2000", 110.0), point("2010", 120.0)]);
        assert_eq!(coords[0], (CHART_PAD, CHART_HEIGHT - CHART_PAD));
        assert_eq!(coords[2], (CHART_WIDTH - CHART_PAD, CHART_PAD));
    }

    #[test]
    fn bar_width_is_relative_to_the_largest_value() {
        assert_eq!(percent(50.0, 200.0), 25.0);
        assert_eq!(percent(3.0, 0.0), 0.0);
    }

    #[test]
    fn path_renders_names_in_order() {
        let html = render_outcome(&Outcome::Path {
            nodes: vec!["Anne Hathaway".into(), "Interstellar".into(), "Matthew McConaughey".into()],
        })
        .into_string();
        let a = html.find("Anne Hathaway").unwrap();
        let b = html.find("Interstellar").unwrap();
        let c = html.find("Matthew McConaughey").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn section_page_lists_only_its_operations() {
        let html = section_page(Section::Cross, &Choices::default(), &Params::default(), None);
        assert!(html.contains("/run/recommend"));
        assert!(!html.contains("/run/co-actors"));
        assert!(html.contains("href=\"/?section=documents\""));
    }

    #[test]
    fn only_the_submitted_form_is_prefilled() {
        let op = catalog::find("count-after-year").unwrap();
        let params = Params::new([("year".to_string(), "1980".to_string())].into());
        let result: AppResult<Outcome> = Ok(Outcome::info("Films released after 1980: 12"));

        let html = section_page(
            Section::Documents,
            &Choices::default(),
            &params,
            Some(Panel { operation: op, result: &result }),
        );

        assert_eq!(html.matches("value=\"1980\"").count(), 1);
        assert!(html.contains("value=\"2007\""));
    }

    #[test]
    fn number_fields_carry_their_minimum() {
        let op = catalog::find("most-connected-films").unwrap();
        let html = operation_form(op, None).into_string();
        assert!(html.contains("min=\"1\""));
        assert!(html.contains("value=\"5\""));
    }

    #[test]
    fn names_are_escaped() {
        let html = render_outcome(&Outcome::List { items: vec!["<script>".to_string()] }).into_string();
        assert!(html.contains("&lt;script&gt;"));
    }
}
