//! Post-session statistics: point-in-time snapshot of two REST endpoints.
//!
//! ## Responsibility
//! Fetch per-question answer/reaction aggregates and word-frequency counts,
//! keep each at its placeholder when its fetch fails, and derive the data the
//! two views present.
//!
//! ## Reaction flow
//! | Link                       | Weight                                  |
//! |----------------------------|-----------------------------------------|
//! | Total → Positive           | sum of counts with `positive` sentiment |
//! | Total → Negative           | sum of counts with `negative` sentiment |
//! | Positive → reaction type   | that reaction's count                   |
//! | Negative → reaction type   | that reaction's count                   |
//!
//! Reactions with any other sentiment do not contribute.
//!
//! ## NOT Responsible For
//! - Live updates: nothing here listens to the channel.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::error::ApiError;

/// Aggregates for a whole project as served by `/api/project-stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    pub project_name: String,
    #[serde(default)]
    pub data: Vec<QuestionStats>,
}

impl Default for ProjectStats {
    fn default() -> Self {
        Self {
            project_name: "No project".to_string(),
            data: Vec::new(),
        }
    }
}

/// Aggregates for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStats {
    pub title: String,
    /// `[label, count]` pairs; the count arrives as a string.
    #[serde(default)]
    pub answers: Vec<(String, AnswerCount)>,
    #[serde(default)]
    pub total_answers: u64,
    #[serde(default)]
    pub total_correct_answers: u64,
    /// `[reactionType, {sentiment, count}]` pairs.
    #[serde(default)]
    pub reactions: Vec<(String, ReactionSummary)>,
}

/// An answer count as sent by the server: normally a string, tolerated as a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerCount {
    Number(u64),
    Text(String),
}

impl AnswerCount {
    /// Integer value, parsing only the leading digits of a text count.
    /// Text with no leading digits counts as 0; too many digits saturate.
    pub fn value(&self) -> u64 {
        match self {
            AnswerCount::Number(n) => *n,
            AnswerCount::Text(s) => {
                let digits: String = s
                    .trim_start()
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                match digits.parse() {
                    Ok(n) => n,
                    Err(_) if digits.is_empty() => 0,
                    // Only overflow is left: every char is a digit.
                    Err(_) => u64::MAX,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionSummary {
    pub sentiment: Sentiment,
    pub count: u64,
}

/// One entry of `/api/word-counts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCount {
    pub text: String,
    pub value: u64,
}

/// Placeholder shown until word counts arrive.
pub fn placeholder_word_counts() -> Vec<WordCount> {
    vec![WordCount {
        text: "nothing".to_string(),
        value: 0,
    }]
}

/// One weighted `from → to` edge of the reaction flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowLink {
    pub from: String,
    pub to: String,
    pub weight: u64,
}

impl FlowLink {
    fn new(from: &str, to: &str, weight: u64) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            weight,
        }
    }
}

/// Reshape reaction pairs into the two-level Total → sentiment → type flow.
pub fn reaction_flow(reactions: &[(String, ReactionSummary)]) -> Vec<FlowLink> {
    let of = |sentiment: Sentiment| {
        reactions
            .iter()
            .filter(move |(_, r)| r.sentiment == sentiment)
    };

    let total = |sentiment: Sentiment| of(sentiment).fold(0u64, |acc, (_, r)| acc.saturating_add(r.count));
    let positive_total = total(Sentiment::Positive);
    let negative_total = total(Sentiment::Negative);

    let mut links = vec![
        FlowLink::new("Total", "Positive", positive_total),
        FlowLink::new("Total", "Negative", negative_total),
    ];
    links.extend(of(Sentiment::Positive).map(|(kind, r)| FlowLink::new("Positive", kind, r.count)));
    links.extend(of(Sentiment::Negative).map(|(kind, r)| FlowLink::new("Negative", kind, r.count)));
    links
}

/// Which of the two mutually exclusive views is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PlotType {
    #[default]
    Answers,
    Reactions,
}

impl fmt::Display for PlotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlotType::Answers => write!(f, "answers"),
            PlotType::Reactions => write!(f, "reactions"),
        }
    }
}

/// Answers view data for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerPanel {
    pub title: String,
    pub bars: Vec<(String, u64)>,
    pub total_answers: u64,
    pub total_correct_answers: u64,
}

/// Widest bar the answers view draws, in cells.
pub const MAX_BAR_WIDTH: usize = 40;

impl AnswerPanel {
    /// Bar lengths scaled so the largest count spans `max_width` cells.
    /// Any nonzero count gets at least one cell.
    pub fn bar_widths(&self, max_width: usize) -> Vec<usize> {
        let max = self.bars.iter().map(|(_, n)| *n).max().unwrap_or(0);
        self.bars
            .iter()
            .map(|(_, n)| scale_bar(*n, max, max_width))
            .collect()
    }
}

fn scale_bar(count: u64, max: u64, max_width: usize) -> usize {
    if max == 0 {
        return 0;
    }
    // count <= max, so the quotient never exceeds max_width.
    let width = (u128::from(count) * max_width as u128 / u128::from(max)) as usize;
    if count > 0 {
        width.max(1)
    } else {
        width
    }
}

/// Reactions view data for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionPanel {
    pub title: String,
    pub links: Vec<FlowLink>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsPanel {
    Answers(Vec<AnswerPanel>),
    Reactions(Vec<ReactionPanel>),
}

/// Which halves of a [`StatsView::load`] succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    pub stats_ok: bool,
    pub word_counts_ok: bool,
}

#[derive(Debug, Clone)]
pub struct StatsView {
    project_id: String,
    stats: ProjectStats,
    word_counts: Vec<WordCount>,
    plot: PlotType,
    loading: bool,
}

impl StatsView {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            stats: ProjectStats::default(),
            word_counts: placeholder_word_counts(),
            plot: PlotType::default(),
            loading: true,
        }
    }

    /// Run both fetches concurrently and apply each result independently.
    ///
    /// Dropping the returned future cancels both requests.
    pub async fn load(&mut self, api: &ApiClient) -> LoadOutcome {
        let (stats, words) = tokio::join!(
            api.fetch_project_stats(&self.project_id),
            api.fetch_word_counts(&self.project_id),
        );
        LoadOutcome {
            stats_ok: self.apply_stats(stats),
            word_counts_ok: self.apply_word_counts(words),
        }
    }

    /// Returns whether the stats were replaced.
    pub fn apply_stats(&mut self, result: Result<ProjectStats, ApiError>) -> bool {
        match result {
            Ok(stats) => {
                info!(project_id = %self.project_id, questions = stats.data.len(), "project stats loaded");
                self.stats = stats;
                self.loading = false;
                true
            }
            Err(e) => {
                warn!(error = %e, project_id = %self.project_id, "failed to get project stats");
                false
            }
        }
    }

    /// Returns whether the word counts were replaced.
    pub fn apply_word_counts(&mut self, result: Result<Vec<WordCount>, ApiError>) -> bool {
        match result {
            Ok(words) => {
                self.word_counts = words;
                true
            }
            Err(e) => {
                warn!(error = %e, project_id = %self.project_id, "failed to get word counts");
                false
            }
        }
    }

    pub fn select_plot(&mut self, plot: PlotType) {
        self.plot = plot;
    }

    pub fn plot(&self) -> PlotType {
        self.plot
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn stats(&self) -> &ProjectStats {
        &self.stats
    }

    pub fn word_counts(&self) -> &[WordCount] {
        &self.word_counts
    }

    /// Data for the currently selected view.
    pub fn panel(&self) -> StatsPanel {
        match self.plot {
            PlotType::Answers => StatsPanel::Answers(
                self.stats
                    .data
                    .iter()
                    .map(|q| AnswerPanel {
                        title: q.title.clone(),
                        bars: q.answers.iter().map(|(label, n)| (label.clone(), n.value())).collect(),
                        total_answers: q.total_answers,
                        total_correct_answers: q.total_correct_answers,
                    })
                    .collect(),
            ),
            PlotType::Reactions => StatsPanel::Reactions(
                self.stats
                    .data
                    .iter()
                    .map(|q| ReactionPanel {
                        title: q.title.clone(),
                        links: reaction_flow(&q.reactions),
                    })
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn reaction(kind: &str, sentiment: Sentiment, count: u64) -> (String, ReactionSummary) {
        (kind.to_string(), ReactionSummary { sentiment, count })
    }

    fn sample_stats() -> ProjectStats {
        serde_json::from_str(
            r#"{
                "projectName": "Geography",
                "data": [{
                    "title": "Capital of France?",
                    "answers": [["Paris", "7"], ["Lyon", "2"]],
                    "totalAnswers": 9,
                    "totalCorrectAnswers": 7,
                    "reactions": [
                        ["heart", {"sentiment": "positive", "count": 3}],
                        ["dislike", {"sentiment": "negative", "count": 2}]
                    ]
                }]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn reaction_flow_matches_reference_example() {
        let links = reaction_flow(&[
            reaction("heart", Sentiment::Positive, 3),
            reaction("dislike", Sentiment::Negative, 2),
        ]);
        assert_eq!(
            links,
            vec![
                FlowLink::new("Total", "Positive", 3),
                FlowLink::new("Total", "Negative", 2),
                FlowLink::new("Positive", "heart", 3),
                FlowLink::new("Negative", "dislike", 2),
            ]
        );
    }

    #[test]
    fn reaction_flow_sums_by_sentiment_and_keeps_order() {
        let links = reaction_flow(&[
            reaction("like", Sentiment::Positive, 4),
            reaction("dislike", Sentiment::Negative, 1),
            reaction("heart", Sentiment::Positive, 5),
        ]);
        assert_eq!(links[0].weight, 9);
        assert_eq!(links[1].weight, 1);
        let positive: Vec<&str> = links
            .iter()
            .filter(|l| l.from == "Positive")
            .map(|l| l.to.as_str())
            .collect();
        assert_eq!(positive, vec!["like", "heart"]);
    }

    #[test]
    fn reaction_flow_empty_input_has_zero_totals() {
        let links = reaction_flow(&[]);
        assert_eq!(links.len(), 2);
        assert!(links.iter().all(|l| l.weight == 0));
    }

    #[test]
    fn reaction_flow_ignores_other_sentiments() {
        let stats: Vec<(String, ReactionSummary)> = serde_json::from_str(
            r#"[["shrug", {"sentiment": "neutral", "count": 9}],
                ["heart", {"sentiment": "positive", "count": 1}]]"#,
        )
        .unwrap();
        assert_eq!(stats[0].1.sentiment, Sentiment::Other);
        let links = reaction_flow(&stats);
        assert_eq!(links.len(), 3);
        assert!(links.iter().all(|l| l.to != "shrug"));
    }

    #[rstest]
    #[case(AnswerCount::Text("7".into()), 7)]
    #[case(AnswerCount::Text(" 12".into()), 12)]
    #[case(AnswerCount::Text("12abc".into()), 12)]
    #[case(AnswerCount::Text("abc".into()), 0)]
    #[case(AnswerCount::Text("".into()), 0)]
    #[case(AnswerCount::Number(5), 5)]
    fn answer_count_value(#[case] count: AnswerCount, #[case] expected: u64) {
        assert_eq!(count.value(), expected);
    }

    #[test]
    fn answer_count_accepts_numbers_and_strings() {
        let pairs: Vec<(String, AnswerCount)> =
            serde_json::from_str(r#"[["a", "3"], ["b", 4]]"#).unwrap();
        assert_eq!(pairs[0].1.value(), 3);
        assert_eq!(pairs[1].1.value(), 4);
    }

    #[test]
    fn new_view_starts_with_placeholders() {
        let view = StatsView::new("p-1");
        assert_eq!(view.stats().project_name, "No project");
        assert!(view.stats().data.is_empty());
        assert_eq!(view.word_counts(), placeholder_word_counts().as_slice());
        assert_eq!(view.plot(), PlotType::Answers);
        assert!(view.is_loading());
    }

    #[test]
    fn failures_are_independent() {
        let mut view = StatsView::new("p-1");
        let stats_ok = view.apply_stats(Err(ApiError::Http { status: 500, url: "x".into() }));
        let words_ok = view.apply_word_counts(Ok(vec![WordCount { text: "fun".into(), value: 3 }]));
        assert!(!stats_ok);
        assert!(words_ok);
        assert_eq!(view.stats().project_name, "No project");
        assert!(view.is_loading());
        assert_eq!(view.word_counts()[0].text, "fun");
    }

    #[test]
    fn stats_success_clears_loading() {
        let mut view = StatsView::new("p-1");
        assert!(view.apply_stats(Ok(sample_stats())));
        assert!(!view.is_loading());
        assert_eq!(view.stats().project_name, "Geography");
    }

    #[test]
    fn answers_panel_parses_counts() {
        let mut view = StatsView::new("p-1");
        view.apply_stats(Ok(sample_stats()));
        match view.panel() {
            StatsPanel::Answers(panels) => {
                assert_eq!(panels.len(), 1);
                assert_eq!(panels[0].bars, vec![("Paris".to_string(), 7), ("Lyon".to_string(), 2)]);
                assert_eq!(panels[0].total_answers, 9);
                assert_eq!(panels[0].total_correct_answers, 7);
            }
            other => panic!("expected answers panel, got {other:?}"),
        }
    }

    #[test]
    fn huge_counts_scale_to_bounded_bars() {
        let stats: ProjectStats = serde_json::from_str(
            r#"{"projectName": "Big", "data": [{"title": "q", "answers": [
                ["a", "18446744073709551615"],
                ["b", "5000000000"],
                ["c", "99999999999999999999999"],
                ["d", "1"],
                ["e", "0"]
            ]}]}"#,
        )
        .unwrap();
        let mut view = StatsView::new("p-1");
        view.apply_stats(Ok(stats));
        let StatsPanel::Answers(panels) = view.panel() else {
            panic!("expected answers panel");
        };
        assert_eq!(panels[0].bars[2].1, u64::MAX);

        let widths = panels[0].bar_widths(MAX_BAR_WIDTH);
        assert_eq!(widths, vec![MAX_BAR_WIDTH, 1, MAX_BAR_WIDTH, 1, 0]);
        assert!(widths.iter().all(|w| *w <= MAX_BAR_WIDTH));
    }

    #[test]
    fn reaction_flow_totals_saturate() {
        let reactions = vec![
            reaction("heart", Sentiment::Positive, u64::MAX),
            reaction("like", Sentiment::Positive, 5),
        ];
        let links = reaction_flow(&reactions);
        assert_eq!(links[0], FlowLink::new("Total", "Positive", u64::MAX));
    }

    #[rstest]
    #[case(vec![10, 5, 0], 20, vec![20, 10, 0])]
    #[case(vec![3, 1], 4, vec![4, 1])]
    #[case(vec![1000, 1], 10, vec![10, 1])]
    #[case(vec![0, 0], 10, vec![0, 0])]
    #[case(vec![], 10, vec![])]
    fn bar_widths_scale_to_largest(
        #[case] counts: Vec<u64>,
        #[case] max_width: usize,
        #[case] expected: Vec<usize>,
    ) {
        let panel = AnswerPanel {
            title: "q".into(),
            bars: counts.into_iter().map(|n| (String::new(), n)).collect(),
            total_answers: 0,
            total_correct_answers: 0,
        };
        assert_eq!(panel.bar_widths(max_width), expected);
    }

    #[test]
    fn selecting_reactions_switches_panel() {
        let mut view = StatsView::new("p-1");
        view.apply_stats(Ok(sample_stats()));
        view.select_plot(PlotType::Reactions);
        match view.panel() {
            StatsPanel::Reactions(panels) => {
                assert_eq!(panels[0].title, "Capital of France?");
                assert_eq!(panels[0].links.len(), 4);
            }
            other => panic!("expected reactions panel, got {other:?}"),
        }
    }
}
