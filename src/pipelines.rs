//! Aggregation pipelines for the film collection.
//!
//! Every pipeline starts from [`normalized_film`], which converts the
//! loosely typed source fields into the shape of [`crate::models::FilmDoc`].
//! Numeric conversions map missing or unparseable values to `null` so the
//! later `$match` stages can drop them instead of counting them as zero.

use mongodb::bson::{Bson, Document, Regex, doc};

use crate::models::GenreCriteria;

pub const HIGH_SCORE_MIN_RATING: f64 = 8.0;
/// Revenue is stored in millions.
pub const HIGH_SCORE_MIN_REVENUE: f64 = 50.0;

fn convert(field: &str, to: &str) -> Document {
    doc! {
        "$convert": { "input": field, "to": to, "onError": Bson::Null, "onNull": Bson::Null }
    }
}

/// String value of `field`, empty when it is missing or not convertible.
fn text(field: &str) -> Document {
    doc! { "$convert": { "input": field, "to": "string", "onError": "", "onNull": "" } }
}

/// Genre list as trimmed, non-empty strings. The source field is usually a
/// comma-joined string but arrays are accepted as-is.
pub fn genre_list() -> Document {
    doc! {
        "$filter": {
            "input": {
                "$map": {
                    "input": {
                        "$cond": [
                            { "$isArray": "$genre" },
                            "$genre",
                            { "$split": [text("$genre"), ","] }
                        ]
                    },
                    "as": "g",
                    "in": { "$trim": { "input": text("$$g") } }
                }
            },
            "as": "g",
            "cond": { "$ne": ["$$g", ""] }
        }
    }
}

fn decade() -> Document {
    doc! { "$subtract": ["$year", { "$mod": ["$year", 10] }] }
}

pub fn normalized_film() -> Document {
    doc! {
        "$project": {
            "title": convert("$title", "string"),
            "year": convert("$year", "int"),
            "genres": genre_list(),
            "rating": convert("$rating", "double"),
            "votes": convert("$Votes", "long"),
            "revenue": convert("$revenue", "double"),
            "runtime": convert("$runtime", "int"),
            "director": convert("$Director", "string"),
            "actors": convert("$Actors", "string"),
        }
    }
}

pub fn year_counts() -> Vec<Document> {
    vec![
        normalized_film(),
        doc! { "$match": { "year": { "$ne": Bson::Null } } },
        doc! { "$group": { "_id": "$year", "count": { "$sum": 1 } } },
    ]
}

pub fn most_common_year() -> Vec<Document> {
    let mut pipeline = year_counts();
    pipeline.push(doc! { "$sort": { "count": -1, "_id": 1 } });
    pipeline.push(doc! { "$limit": 1 });
    pipeline
}

/// Films whose normalized year is strictly after `year`, as a single
/// `{ count }` document (no document at all when nothing matches).
pub fn count_after_year(year: i64) -> Vec<Document> {
    vec![
        normalized_film(),
        doc! { "$match": { "year": { "$gt": year } } },
        doc! { "$count": "count" },
    ]
}

pub fn films_per_year() -> Vec<Document> {
    let mut pipeline = year_counts();
    pipeline.push(doc! { "$sort": { "_id": 1 } });
    pipeline
}

pub fn average_votes_in_year(year: i64) -> Vec<Document> {
    vec![
        normalized_film(),
        doc! { "$match": { "year": year } },
        doc! { "$group": { "_id": Bson::Null, "avg": { "$avg": "$votes" } } },
    ]
}

pub fn distinct_genres() -> Vec<Document> {
    vec![
        doc! { "$project": { "genres": genre_list() } },
        doc! { "$unwind": "$genres" },
        doc! { "$group": { "_id": "$genres" } },
        doc! { "$sort": { "_id": 1 } },
    ]
}

pub fn top_revenue_film() -> Vec<Document> {
    vec![
        normalized_film(),
        doc! { "$match": { "revenue": { "$ne": Bson::Null } } },
        doc! { "$sort": { "revenue": -1, "title": 1 } },
        doc! { "$limit": 1 },
    ]
}

/// Directors credited on strictly more than `more_than` films.
pub fn prolific_directors(more_than: i64) -> Vec<Document> {
    vec![
        normalized_film(),
        doc! { "$match": { "director": { "$nin": [Bson::Null, ""] } } },
        doc! {
            "$group": {
                "_id": { "$trim": { "input": "$director" } },
                "count": { "$sum": 1 }
            }
        },
        doc! { "$match": { "count": { "$gt": more_than } } },
        doc! { "$sort": { "count": -1, "_id": 1 } },
    ]
}

pub fn best_genre_by_revenue() -> Vec<Document> {
    vec![
        normalized_film(),
        doc! { "$match": { "revenue": { "$ne": Bson::Null } } },
        doc! { "$unwind": "$genres" },
        doc! { "$group": { "_id": "$genres", "avgRevenue": { "$avg": "$revenue" } } },
        doc! { "$sort": { "avgRevenue": -1, "_id": 1 } },
        doc! { "$limit": 1 },
    ]
}

pub fn top_rated_per_decade(per_decade: i64) -> Vec<Document> {
    vec![
        normalized_film(),
        doc! { "$match": { "year": { "$ne": Bson::Null }, "rating": { "$ne": Bson::Null } } },
        doc! { "$addFields": { "decade": decade() } },
        doc! { "$sort": { "rating": -1, "title": 1 } },
        doc! {
            "$group": {
                "_id": "$decade",
                "films": { "$push": { "title": "$title", "rating": "$rating" } }
            }
        },
        doc! { "$project": { "top3": { "$slice": ["$films", per_decade] } } },
        doc! { "$sort": { "_id": 1 } },
    ]
}

pub fn longest_film_per_genre() -> Vec<Document> {
    vec![
        normalized_film(),
        doc! { "$match": { "runtime": { "$ne": Bson::Null } } },
        doc! { "$unwind": "$genres" },
        doc! { "$sort": { "runtime": -1, "title": 1 } },
        doc! {
            "$group": {
                "_id": "$genres",
                "title": { "$first": "$title" },
                "runtime": { "$first": "$runtime" }
            }
        },
        doc! { "$sort": { "_id": 1 } },
    ]
}

/// Copies high-score films into `target`. `$merge` on `_id` replaces
/// documents already present, so running it again adds nothing.
pub fn high_score_view(target: &str) -> Vec<Document> {
    vec![
        doc! {
            "$addFields": {
                "_rating": convert("$rating", "double"),
                "_revenue": convert("$revenue", "double"),
            }
        },
        doc! {
            "$match": {
                "_rating": { "$gt": HIGH_SCORE_MIN_RATING },
                "_revenue": { "$gt": HIGH_SCORE_MIN_REVENUE },
            }
        },
        doc! { "$unset": ["_rating", "_revenue"] },
        doc! {
            "$merge": {
                "into": target,
                "on": "_id",
                "whenMatched": "replace",
                "whenNotMatched": "insert"
            }
        },
    ]
}

pub fn runtime_revenue_sums() -> Vec<Document> {
    vec![
        normalized_film(),
        doc! { "$match": { "runtime": { "$ne": Bson::Null }, "revenue": { "$ne": Bson::Null } } },
        doc! { "$addFields": { "x": { "$toDouble": "$runtime" }, "y": "$revenue" } },
        doc! {
            "$group": {
                "_id": Bson::Null,
                "n": { "$sum": 1 },
                "sx": { "$sum": "$x" },
                "sy": { "$sum": "$y" },
                "sxy": { "$sum": { "$multiply": ["$x", "$y"] } },
                "sxx": { "$sum": { "$multiply": ["$x", "$x"] } },
                "syy": { "$sum": { "$multiply": ["$y", "$y"] } },
            }
        },
    ]
}

pub fn average_runtime_by_decade() -> Vec<Document> {
    vec![
        normalized_film(),
        doc! { "$match": { "year": { "$ne": Bson::Null }, "runtime": { "$ne": Bson::Null } } },
        doc! { "$group": { "_id": decade(), "avgRuntime": { "$avg": "$runtime" } } },
        doc! { "$sort": { "_id": 1 } },
    ]
}

/// Best film for a set of genres whose cast does not mention the excluded
/// actor. The cast match is a case-insensitive substring match.
pub fn recommend_by_genres(criteria: &GenreCriteria) -> Vec<Document> {
    let excluded = Regex {
        pattern: regex::escape(criteria.excluded_actor.trim()),
        options: "i".to_string(),
    };

    vec![
        normalized_film(),
        doc! {
            "$match": {
                "genres": { "$in": criteria.genres.clone() },
                "actors": { "$not": excluded },
                "rating": { "$gte": criteria.min_rating },
                "votes": { "$gte": criteria.min_votes },
            }
        },
        doc! { "$sort": { "rating": -1, "votes": -1, "title": 1 } },
        doc! { "$limit": 1 },
    ]
}

/// Sums produced by [`runtime_revenue_sums`].
#[derive(Clone, Copy, Debug, Default, serde::Deserialize)]
pub struct PairSums {
    pub n: i64,
    pub sx: f64,
    pub sy: f64,
    pub sxy: f64,
    pub sxx: f64,
    pub syy: f64,
}

/// Pearson coefficient from running sums. `None` with fewer than two pairs
/// or when either variable is constant.
pub fn pearson(s: &PairSums) -> Option<f64> {
    if s.n < 2 {
        return None;
    }
    let n = s.n as f64;
    let cov = n * s.sxy - s.sx * s.sy;
    let var_x = n * s.sxx - s.sx * s.sx;
    let var_y = n * s.syy - s.sy * s.sy;
    if var_x <= 0.0 || var_y <= 0.0 {
        return None;
    }
    Some((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sums(pairs: &[(f64, f64)]) -> PairSums {
        pairs.iter().fold(PairSums::default(), |mut s, &(x, y)| {
            s.n += 1;
            s.sx += x;
            s.sy += y;
            s.sxy += x * y;
            s.sxx += x * x;
            s.syy += y * y;
            s
        })
    }

    fn stage<'a>(pipeline: &'a [Document], name: &str) -> &'a Document {
        pipeline
            .iter()
            .find_map(|s| s.get_document(name).ok())
            .unwrap_or_else(|| panic!("no {name} stage"))
    }

    #[test]
    fn pearson_of_linear_data_is_one() {
        let r = pearson(&sums(&[(90.0, 10.0), (100.0, 20.0), (110.0, 30.0)])).unwrap();
        assert!((r - 1.0).abs() < 1e-9);

        let r = pearson(&sums(&[(90.0, 30.0), (100.0, 20.0), (110.0, 10.0)])).unwrap();
        assert!((r + 1.0).abs() < 1e-9);
    }

    #[test]
    fn pearson_needs_two_pairs_and_variance() {
        assert_eq!(pearson(&sums(&[])), None);
        assert_eq!(pearson(&sums(&[(120.0, 55.0)])), None);
        assert_eq!(pearson(&sums(&[(120.0, 10.0), (120.0, 80.0)])), None);
    }

    #[test]
    fn revenue_queries_drop_missing_revenue() {
        for pipeline in [top_revenue_film(), best_genre_by_revenue(), runtime_revenue_sums()] {
            let matched = stage(&pipeline, "$match");
            assert_eq!(
                matched.get_document("revenue").unwrap(),
                &doc! { "$ne": Bson::Null },
            );
        }
    }

    #[test]
    fn revenue_is_converted_with_null_fallbacks() {
        let projected = stage(&[normalized_film()], "$project").clone();
        let revenue = projected.get_document("revenue").unwrap().get_document("$convert").unwrap();
        assert_eq!(revenue.get("onError"), Some(&Bson::Null));
        assert_eq!(revenue.get("onNull"), Some(&Bson::Null));
        assert_eq!(revenue.get_str("input").unwrap(), "$revenue");
    }

    #[test]
    fn recommendation_filter_excludes_actor_case_insensitively() {
        let criteria = GenreCriteria {
            genres: vec!["Drama".to_string()],
            excluded_actor: "Casey Affleck".to_string(),
            min_rating: 5.0,
            min_votes: 500,
        };
        let pipeline = recommend_by_genres(&criteria);
        let matched = stage(&pipeline, "$match");

        let Some(Bson::RegularExpression(re)) =
            matched.get_document("actors").unwrap().get("$not")
        else {
            panic!("cast exclusion must be a regex");
        };
        assert_eq!(re.pattern, "Casey Affleck");
        assert_eq!(re.options, "i");
        assert_eq!(
            matched.get_document("genres").unwrap(),
            &doc! { "$in": ["Drama"] },
        );
        assert_eq!(matched.get_document("rating").unwrap(), &doc! { "$gte": 5.0 });
        assert_eq!(matched.get_document("votes").unwrap(), &doc! { "$gte": 500_i64 });
    }

    #[test]
    fn excluded_actor_is_escaped() {
        let criteria = GenreCriteria {
            genres: vec!["Comedy".to_string()],
            excluded_actor: "  R. Lee (Jr.) ".to_string(),
            min_rating: 5.0,
            min_votes: 500,
        };
        let pipeline = recommend_by_genres(&criteria);
        let matched = stage(&pipeline, "$match");
        let Some(Bson::RegularExpression(re)) =
            matched.get_document("actors").unwrap().get("$not")
        else {
            panic!("cast exclusion must be a regex");
        };
        assert_eq!(re.pattern, r"R\. Lee \(Jr\.\)");
    }

    #[test]
    fn high_score_view_merges_on_id() {
        let pipeline = high_score_view("high_score_films");
        let merge = stage(&pipeline, "$merge");
        assert_eq!(merge.get_str("into").unwrap(), "high_score_films");
        assert_eq!(merge.get_str("on").unwrap(), "_id");
        assert_eq!(merge.get_str("whenMatched").unwrap(), "replace");
        assert!(pipeline.last().unwrap().contains_key("$merge"));
    }

    fn uses_operator(value: &Bson, operator: &str) -> bool {
        match value {
            Bson::Document(d) => d.iter().any(|(k, v)| k == operator || uses_operator(v, operator)),
            Bson::Array(items) => items.iter().any(|v| uses_operator(v, operator)),
            _ => false,
        }
    }

    #[test]
    fn string_fields_never_fail_the_pipeline() {
        for pipeline in [distinct_genres(), prolific_directors(5), top_revenue_film()] {
            for s in &pipeline {
                assert!(!uses_operator(&Bson::Document(s.clone()), "$toString"), "{s}");
            }
        }

        let projected = stage(&[normalized_film()], "$project").clone();
        let director = projected.get_document("director").unwrap().get_document("$convert").unwrap();
        assert_eq!(director.get_str("to").unwrap(), "string");
        assert_eq!(director.get("onError"), Some(&Bson::Null));

        let split_input = text("$genre");
        let genre = split_input.get_document("$convert").unwrap();
        assert_eq!(genre.get_str("onError").unwrap(), "");
        assert_eq!(genre.get_str("onNull").unwrap(), "");
    }

    #[test]
    fn count_after_year_filters_the_normalized_year() {
        let pipeline = count_after_year(1999);
        assert_eq!(pipeline[0], normalized_film());
        assert_eq!(stage(&pipeline, "$match"), &doc! { "year": { "$gt": 1999_i64 } });
        assert_eq!(pipeline.last().unwrap(), &doc! { "$count": "count" });
    }

    #[test]
    fn prolific_directors_threshold_is_exclusive() {
        let pipeline = prolific_directors(5);
        let counted = pipeline
            .iter()
            .filter_map(|s| s.get_document("$match").ok())
            .find(|m| m.contains_key("count"))
            .unwrap();
        assert_eq!(counted.get_document("count").unwrap(), &doc! { "$gt": 5_i64 });
    }
}
