//! Keyword router
//!
//! Pure function matching free-text input against project keywords.

use crate::model::{Project, RouteResult};

/// Matches a natural-language message against project keywords and returns
/// the best-matching project, or `None` if nothing matches.
///
/// Tokenizes the message by whitespace, lower-cased; a keyword counts only
/// on an exact token match (substrings never match). The project with the
/// most matched keywords wins; ties break on higher confidence, so a
/// project with fewer total keywords beats one with more on the same raw
/// match count. Confidence = matched / total keywords for the winner.
pub fn route(message: &str, projects: &[Project]) -> Option<RouteResult> {
    if message.is_empty() || projects.is_empty() {
        return None;
    }

    let words: Vec<String> = message.split_whitespace().map(str::to_lowercase).collect();

    let mut best: Option<RouteResult> = None;
    let mut best_count = 0usize;

    for project in projects {
        if project.keywords.is_empty() {
            continue;
        }

        let matched: Vec<String> = project
            .keywords
            .iter()
            .filter(|kw| {
                let kw = kw.to_lowercase();
                words.iter().any(|w| *w == kw)
            })
            .cloned()
            .collect();

        let confidence = matched.len() as f64 / project.keywords.len() as f64;
        let better = matched.len() > best_count
            || (matched.len() == best_count
                && best.as_ref().is_some_and(|b| confidence > b.confidence));
        if better {
            best_count = matched.len();
            best = Some(RouteResult {
                project: project.name.clone(),
                confidence,
                matched_keywords: matched,
            });
        }
    }

    if best_count == 0 {
        return None;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(name: &str, keywords: &[&str]) -> Project {
        Project {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_message_or_projects() {
        assert!(route("", &[project("a", &["api"])]).is_none());
        assert!(route("fix the api", &[]).is_none());
    }

    #[test]
    fn test_exact_token_match_case_insensitive() {
        let projects = vec![project("api-service", &["API", "auth"])];
        let result = route("fix the api login flow", &projects).unwrap();
        assert_eq!(result.project, "api-service");
        assert_eq!(result.matched_keywords, vec!["API"]);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_substring_never_matches() {
        // "build" contains "ui" as no token; "ui" must not match inside words.
        let projects = vec![project("web-ui", &["ui"])];
        assert!(route("build the new service", &projects).is_none());
    }

    #[test]
    fn test_no_keyword_overlap_returns_none() {
        let projects = vec![project("api-service", &["api", "auth"])];
        assert!(route("update the docs", &projects).is_none());
    }

    #[test]
    fn test_most_matches_wins() {
        let projects = vec![
            project("api-service", &["api", "auth", "login"]),
            project("web-ui", &["ui", "frontend"]),
        ];
        let result = route("fix api auth and the ui", &projects).unwrap();
        assert_eq!(result.project, "api-service");
        assert_eq!(result.matched_keywords, vec!["api", "auth"]);
    }

    #[test]
    fn test_tie_breaks_on_confidence() {
        // A: 5 keywords, 1 match (0.2). B: 1 keyword, 1 match (1.0). B wins.
        let projects = vec![
            project("a", &["api", "auth", "login", "token", "session"]),
            project("b", &["deploy"]),
        ];
        let result = route("deploy the api", &projects).unwrap();
        assert_eq!(result.project, "b");
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_projects_without_keywords_are_skipped() {
        let projects = vec![project("bare", &[]), project("api-service", &["api"])];
        let result = route("api is down", &projects).unwrap();
        assert_eq!(result.project, "api-service");
    }
}
