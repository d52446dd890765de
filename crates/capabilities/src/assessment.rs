use async_trait::async_trait;
use rampup_core::{CapabilityDescriptor, ProfileDelta, ReplyFragment, Result, SuggestedAction};

use crate::{Capability, CapabilityRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssessmentStatus {
    Available,
    Locked,
}

#[derive(Debug, Clone)]
pub struct AssessmentInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub duration_min: u32,
    pub questions: u32,
    pub difficulty: &'static str,
    pub status: AssessmentStatus,
}

#[derive(Debug, Clone)]
pub struct Question {
    pub prompt: &'static str,
    pub options: &'static [&'static str],
    pub correct: usize,
}

/// Outcome of grading one submitted answer sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeResult {
    pub score: f32,
    pub correct: usize,
    pub total: usize,
    pub passed: bool,
    pub feedback: &'static str,
}

/// Catalog keyed by role. Locked entries are visible but not yet startable;
/// they unlock as earlier assessments are passed.
pub fn catalog_for_role(role: &str) -> &'static [AssessmentInfo] {
    const ENGINEER: &[AssessmentInfo] = &[
        AssessmentInfo {
            id: "tech_001",
            name: "Technical Fundamentals",
            duration_min: 30,
            questions: 20,
            difficulty: "intermediate",
            status: AssessmentStatus::Available,
        },
        AssessmentInfo {
            id: "code_001",
            name: "Coding Best Practices",
            duration_min: 45,
            questions: 15,
            difficulty: "intermediate",
            status: AssessmentStatus::Available,
        },
        AssessmentInfo {
            id: "arch_001",
            name: "System Architecture",
            duration_min: 40,
            questions: 25,
            difficulty: "advanced",
            status: AssessmentStatus::Locked,
        },
    ];
    const SALES: &[AssessmentInfo] = &[
        AssessmentInfo {
            id: "product_001",
            name: "Product Knowledge",
            duration_min: 25,
            questions: 30,
            difficulty: "beginner",
            status: AssessmentStatus::Available,
        },
        AssessmentInfo {
            id: "sales_001",
            name: "Sales Process",
            duration_min: 30,
            questions: 20,
            difficulty: "intermediate",
            status: AssessmentStatus::Available,
        },
    ];
    const DEFAULT: &[AssessmentInfo] = &[
        AssessmentInfo {
            id: "culture_001",
            name: "Company Culture Quiz",
            duration_min: 15,
            questions: 15,
            difficulty: "beginner",
            status: AssessmentStatus::Available,
        },
        AssessmentInfo {
            id: "policy_001",
            name: "Policies & Compliance",
            duration_min: 20,
            questions: 20,
            difficulty: "beginner",
            status: AssessmentStatus::Available,
        },
    ];

    let role = role.to_lowercase();
    if role.contains("engineer") || role.contains("developer") {
        ENGINEER
    } else if role.contains("sales") {
        SALES
    } else {
        DEFAULT
    }
}

pub fn questions_for(assessment_id: &str) -> &'static [Question] {
    const CULTURE: &[Question] = &[
        Question {
            prompt: "What is our company's primary mission?",
            options: &[
                "Maximize profits",
                "Deliver innovative solutions to customers",
                "Expand globally",
                "Reduce costs",
            ],
            correct: 1,
        },
        Question {
            prompt: "Which value is most important in our company culture?",
            options: &[
                "Competition",
                "Individual achievement",
                "Collaboration and teamwork",
                "Speed over quality",
            ],
            correct: 2,
        },
    ];
    const TECH: &[Question] = &[Question {
        prompt: "What is the recommended approach for code reviews?",
        options: &[
            "Review only critical bugs",
            "All code must be reviewed before merging",
            "Reviews are optional",
            "Only senior developers review code",
        ],
        correct: 1,
    }];

    match assessment_id {
        "culture_001" => CULTURE,
        "tech_001" => TECH,
        _ => &[],
    }
}

/// Pure grading: answers are option indexes aligned with the question order.
/// Missing answers count as wrong. Passing grade is 70 percent.
pub fn grade(questions: &[Question], answers: &[usize]) -> GradeResult {
    let total = questions.len();
    let correct = questions
        .iter()
        .zip(answers.iter())
        .filter(|(q, a)| q.correct == **a)
        .count();
    let score = if total == 0 {
        0.0
    } else {
        (correct as f32 / total as f32) * 100.0
    };
    GradeResult {
        score,
        correct,
        total,
        passed: score >= 70.0,
        feedback: feedback_for(score),
    }
}

/// A graded assessment becomes the employee's readiness score, applied
/// through the normal commit path.
pub fn readiness_delta(result: &GradeResult) -> ProfileDelta {
    ProfileDelta {
        readiness_score: Some(result.score.round().clamp(0.0, 100.0) as u8),
        ..Default::default()
    }
}

fn feedback_for(score: f32) -> &'static str {
    if score >= 90.0 {
        "Excellent! You have demonstrated mastery of this topic."
    } else if score >= 80.0 {
        "Great job! You have a strong understanding of this material."
    } else if score >= 70.0 {
        "Good work! You passed the assessment. Review the materials to strengthen your knowledge."
    } else {
        "You did not pass this time. Please review the materials and try again."
    }
}

/// Lists role-appropriate assessments and surfaces readiness standing.
pub struct AssessmentCapability {
    descriptor: CapabilityDescriptor,
}

impl AssessmentCapability {
    pub fn new() -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                "assessment",
                "Skill assessments, quizzes and readiness evaluation",
            )
            .with_intents(&["assessment", "quiz", "readiness"])
            .with_priority(45),
        }
    }
}

impl Default for AssessmentCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Capability for AssessmentCapability {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn handle(&self, request: &CapabilityRequest) -> Result<ReplyFragment> {
        let role = request.profile.role.as_deref().unwrap_or("employee");
        let catalog = catalog_for_role(role);

        let mut text = format!("Assessments available for your role ({}):\n", role);
        for info in catalog {
            let status = match info.status {
                AssessmentStatus::Available => "available",
                AssessmentStatus::Locked => "locked",
            };
            text.push_str(&format!(
                "- {} ({} questions, {} min, {}, {})\n",
                info.name, info.questions, info.duration_min, info.difficulty, status
            ));
        }
        match request.profile.readiness_score {
            Some(score) => {
                text.push_str(&format!("Your current readiness score is {}/100.", score))
            }
            None => text.push_str(
                "You have no readiness score yet; a first assessment will establish one.",
            ),
        }

        // Role known means the catalog is actually tailored, not the default.
        let confidence = if request.profile.role.is_some() { 0.8 } else { 0.6 };

        Ok(ReplyFragment::new("assessment", &text, confidence).with_actions(vec![
            SuggestedAction::new("Start an assessment", "start_assessment"),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampup_core::UserProfile;

    #[test]
    fn test_catalog_by_role() {
        assert_eq!(catalog_for_role("Senior Engineer").len(), 3);
        assert_eq!(catalog_for_role("sales rep").len(), 2);
        assert_eq!(catalog_for_role("chef")[0].id, "culture_001");
    }

    #[test]
    fn test_grade_passing() {
        let questions = questions_for("culture_001");
        let result = grade(questions, &[1, 2]);
        assert_eq!(result.correct, 2);
        assert_eq!(result.score, 100.0);
        assert!(result.passed);
        assert!(result.feedback.starts_with("Excellent"));
    }

    #[test]
    fn test_grade_failing_and_missing_answers() {
        let questions = questions_for("culture_001");
        let result = grade(questions, &[0]);
        assert_eq!(result.correct, 0);
        assert!(!result.passed);
        assert!(result.feedback.contains("did not pass"));
    }

    #[test]
    fn test_grade_exact_boundary() {
        // 7 of 10 correct is exactly the passing grade.
        let questions: Vec<Question> = (0..10)
            .map(|_| Question {
                prompt: "q",
                options: &["a", "b"],
                correct: 0,
            })
            .collect();
        let answers = [0, 0, 0, 0, 0, 0, 0, 1, 1, 1];
        let result = grade(&questions, &answers);
        assert_eq!(result.score, 70.0);
        assert!(result.passed);
        assert!(result.feedback.starts_with("Good work"));
    }

    #[test]
    fn test_readiness_delta_from_grade() {
        let questions = questions_for("culture_001");
        let result = grade(questions, &[1, 2]);
        let delta = readiness_delta(&result);
        assert_eq!(delta.readiness_score, Some(100));
    }

    #[test]
    fn test_grade_empty_assessment() {
        let result = grade(&[], &[]);
        assert_eq!(result.score, 0.0);
        assert!(!result.passed);
    }

    #[tokio::test]
    async fn test_handle_lists_role_catalog() {
        let cap = AssessmentCapability::new();
        let mut profile = UserProfile::default();
        profile.role = Some("engineer".to_string());
        profile.readiness_score = Some(40);
        let request = CapabilityRequest {
            text: "what quizzes can I take?".to_string(),
            profile,
            recent_turns: Vec::new(),
            evidence: Vec::new(),
            evidence_budget: 3,
            company: "Acme".to_string(),
        };
        let fragment = cap.handle(&request).await.unwrap();
        assert!(fragment.text.contains("Technical Fundamentals"));
        assert!(fragment.text.contains("40/100"));
        assert_eq!(fragment.actions[0].action, "start_assessment");
    }
}
