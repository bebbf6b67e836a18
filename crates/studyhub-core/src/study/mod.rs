//! Study feature services
//!
//! Each operation builds a provider-agnostic message list, runs it through
//! the [`ModelRouter`] and hands the raw text to the normalizer. Only
//! [`GenerationFailed`] reaches the caller; unusable model output becomes the
//! payload's default shape.

mod essentials;
mod plans;

pub use essentials::{Essentials, MarksDistribution};
pub use plans::{
    DaySchedule, ExamTactic, RevisionPhase, RevisionPlan, RevisionWeek, SkillStep, SurvivalPlan,
    SurvivalPlanRequest, TimeSlot, WeekPlan,
};

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::GenerationFailed;
use crate::normalize::normalize;
use crate::providers::{ChatMessage, GenerationOptions, ModelRouter};
use crate::upload::UploadedFile;

/// Document text beyond this many characters is cut before prompting
pub const DOCUMENT_CHAR_LIMIT: usize = 10_000;

pub const DEFAULT_OCR_PROMPT: &str =
    "Extract all text from this image, maintaining structure and formatting.";

const ESSENTIALS_SYSTEM: &str = "You are an academic analyzer. Extract the core essential topics \
from the provided syllabus or document, grouped by importance and mark weightage. Return ONLY valid \
JSON with no markdown formatting.";

const SURVIVAL_PLAN_SYSTEM: &str = "You are a study planning expert. Generate clear, structured \
study survival plans with weekly breakdowns, skill milestones, and exam strategies. Return ONLY a \
valid JSON object with this structure: {\"weeklyPlan\": [{\"week\": 1, \"focus\": \"...\", \
\"tasks\": [\"...\", \"...\"], \"milestones\": [\"...\"]}], \"dailySchedule\": [{\"day\": \
\"Monday\", \"timeSlots\": [{\"time\": \"9-11 AM\", \"activity\": \"...\"}]}], \"skillRoadmap\": \
[{\"skill\": \"...\", \"currentLevel\": \"...\", \"targetLevel\": \"...\", \"action\": \"...\"}], \
\"revisionPlan\": [{\"phase\": \"...\", \"duration\": \"...\", \"focus\": \"...\", \"method\": \
\"...\"}], \"examStrategy\": [{\"subject\": \"...\", \"priority\": \"...\", \"tactics\": \
[\"...\", \"...\"]}], \"productivityRules\": [\"Rule 1\", \"Rule 2\"]}";

const REVISION_PLAN_SYSTEM: &str =
    "You are an expert study planner. Create comprehensive revision plans. Return ONLY valid JSON.";

const TUTOR_SYSTEM: &str = "You are an expert tutor helping students understand concepts. \
Provide clear, detailed explanations.";

const EXTRACTION_SYSTEM: &str = "You are a data extraction assistant. Return only valid JSON.";

/// Essentials together with the model text they were parsed from
#[derive(Debug, Clone)]
pub struct EssentialsReport {
    pub essentials: Essentials,
    pub raw: String,
}

/// Feature services over a shared router
#[derive(Clone)]
pub struct StudyAssistant {
    router: Arc<ModelRouter>,
}

impl StudyAssistant {
    pub fn new(router: Arc<ModelRouter>) -> Self {
        Self { router }
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    /// Essentials for an uploaded file. Images are read with the vision
    /// model and PDFs locally; anything unreadable is described by name and
    /// type so the text model can still infer the subject.
    pub async fn extract_essentials(
        &self,
        file: &UploadedFile,
    ) -> Result<EssentialsReport, GenerationFailed> {
        info!(
            "Processing file: {} ({}, {} bytes)",
            file.name,
            file.mime_type,
            file.size()
        );
        let text = self.document_text(file).await;
        self.extract_essentials_from_text(&text, &file.name).await
    }

    async fn document_text(&self, file: &UploadedFile) -> String {
        if file.is_image() {
            match self
                .router
                .extract_text_from_image(&file.bytes, &file.mime_type, DEFAULT_OCR_PROMPT)
                .await
            {
                Ok(text) if !text.trim().is_empty() => return text,
                Ok(_) => warn!("No text found in image {}", file.name),
                Err(e) => warn!("Image text extraction failed for {}: {}", file.name, e),
            }
        } else if file.is_pdf() {
            // pdf-extract can panic on malformed input
            let bytes = file.bytes.clone();
            match tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await
            {
                Ok(Ok(text)) if !text.trim().is_empty() => return text,
                Ok(Ok(_)) => warn!("No text layer in PDF {}", file.name),
                Ok(Err(e)) => warn!("Failed to read PDF {}: {}", file.name, e),
                Err(e) => warn!("PDF reader aborted on {}: {}", file.name, e),
            }
        }
        describe_file(file)
    }

    /// Essentials from document text that is already available
    pub async fn extract_essentials_from_text(
        &self,
        text: &str,
        file_name: &str,
    ) -> Result<EssentialsReport, GenerationFailed> {
        let messages = vec![
            ChatMessage::system(ESSENTIALS_SYSTEM),
            ChatMessage::user(format!(
                "Analyze this document ({}) and return a JSON object in this exact format:\n\n\
                 {{\n  \"creativeTopics\": [\"topic\"],\n  \"theoryTopics\": [\"topic\"],\n  \
                 \"numericalTopics\": [\"topic\"],\n  \"marksDistribution\": {{\n    \
                 \"twoMarks\": [\"short answer question\"],\n    \"threeMarks\": [\"medium question\"],\n    \
                 \"fourteenMarks\": [\"long question\"],\n    \"sixteenMarks\": [\"very long question\"]\n  }}\n}}\n\n\
                 Provide concise bullet points for each array.\n\nDocument content:\n{}",
                file_name,
                truncate_chars(text, DOCUMENT_CHAR_LIMIT)
            )),
        ];
        let options = GenerationOptions::default()
            .with_temperature(0.2)
            .with_max_tokens(2000);

        let raw = self.router.generate_with_history(&messages, &options).await?;
        let essentials: Essentials = normalize(&raw);
        debug!(
            "Essentials for {}: {} topics",
            file_name,
            essentials.topic_count()
        );
        Ok(EssentialsReport { essentials, raw })
    }

    /// Free-text survival plan from a single prompt
    pub async fn generate_survival_plan_text(
        &self,
        request: &SurvivalPlanRequest,
    ) -> Result<String, GenerationFailed> {
        let prompt = format!(
            "Generate a weekly survival plan for a student using the following details:\n\
             Skills: {}\nStress Level: {}\nTime Available: {}\nExam Dates: {}\nGoals: {}\n\
             Provide output in bullet points and weekly schedule format.",
            request.skills_text(),
            request.stress_level_text(),
            request.time_available_text(),
            request.exam_dates_text(),
            request.goals_text()
        );
        let options = GenerationOptions::default()
            .with_temperature(0.3)
            .with_max_tokens(2000);

        info!("Generating survival plan");
        self.router.generate(&prompt, &options).await
    }

    /// Structured survival plan with six sections
    pub async fn generate_survival_plan(
        &self,
        request: &SurvivalPlanRequest,
    ) -> Result<SurvivalPlan, GenerationFailed> {
        let mut details = format!(
            "Generate a weekly survival plan for a student using the following details:\n\
             Skills: {}\nStress Level: {}\nTime Available: {}\nExam Dates: {}\nGoals: {}\n",
            request.skills_text(),
            request.stress_level_text(),
            request.time_available_text(),
            request.exam_dates_text(),
            request.goals_text()
        );
        if let Some(deadline) = request.deadline_text() {
            details.push_str(&format!("Deadline: {}\n", deadline));
        }
        details.push_str(
            "\nProvide output in bullet points and weekly schedule format. Include:\n\
             1. Weekly breakdown with focus areas and tasks\n\
             2. Daily schedule with time slots\n\
             3. Skill development roadmap\n\
             4. Revision plan and strategies\n\
             5. Exam preparation tactics\n\
             6. Productivity tips",
        );

        let messages = vec![
            ChatMessage::system(SURVIVAL_PLAN_SYSTEM),
            ChatMessage::user(details),
        ];
        let options = GenerationOptions::default()
            .with_temperature(0.3)
            .with_max_tokens(3000);

        info!("Generating structured survival plan");
        let raw = self.router.generate_with_history(&messages, &options).await?;
        Ok(normalize(&raw))
    }

    /// Week-by-week revision plan for a syllabus
    pub async fn generate_revision_plan(
        &self,
        syllabus: &str,
        preferences: Option<&Value>,
    ) -> Result<RevisionPlan, GenerationFailed> {
        let preferences = preferences
            .map(Value::to_string)
            .unwrap_or_else(|| "{}".to_string());
        let messages = vec![
            ChatMessage::system(REVISION_PLAN_SYSTEM),
            ChatMessage::user(format!(
                "Create a revision plan for this syllabus. Return JSON in this format:\n\n\
                 {{\n  \"weeks\": [\n    {{\n      \"weekNumber\": 1,\n      \
                 \"topics\": [\"topic1\", \"topic2\"],\n      \"goals\": \"Weekly goals\",\n      \
                 \"activities\": [\"activity1\", \"activity2\"],\n      \
                 \"assessments\": \"Assessment plan\"\n    }}\n  ],\n  \
                 \"studyTips\": [\"tip1\", \"tip2\"],\n  \"resources\": [\"resource1\", \"resource2\"]\n}}\n\n\
                 Syllabus: {}\nPreferences: {}",
                truncate_chars(syllabus, DOCUMENT_CHAR_LIMIT),
                preferences
            )),
        ];
        let options = GenerationOptions::default().with_temperature(0.3);

        info!("Generating revision plan");
        let raw = self.router.generate_with_history(&messages, &options).await?;
        Ok(normalize(&raw))
    }

    /// Tutor-style explanation. The answer is returned as the model wrote it.
    pub async fn solve_doubt(
        &self,
        question: &str,
        context: Option<&str>,
    ) -> Result<String, GenerationFailed> {
        let mut content = String::new();
        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            content.push_str(&format!(
                "Context: {}\n\n",
                truncate_chars(context, DOCUMENT_CHAR_LIMIT)
            ));
        }
        content.push_str(&format!(
            "Question: {}\n\nProvide a comprehensive explanation.",
            question
        ));

        let messages = vec![ChatMessage::system(TUTOR_SYSTEM), ChatMessage::user(content)];
        let options = GenerationOptions::default()
            .with_temperature(0.4)
            .with_max_tokens(2048);

        self.router.generate_with_history(&messages, &options).await
    }

    /// Arbitrary JSON extraction driven by the caller's instruction
    pub async fn extract_structured_data(
        &self,
        text: &str,
        instruction: &str,
    ) -> Result<Value, GenerationFailed> {
        let messages = vec![
            ChatMessage::system(EXTRACTION_SYSTEM),
            ChatMessage::user(format!(
                "{}\n\nText to process:\n{}",
                instruction,
                truncate_chars(text, DOCUMENT_CHAR_LIMIT)
            )),
        ];
        let raw = self
            .router
            .generate_with_history(&messages, &GenerationOptions::default())
            .await?;
        Ok(normalize(&raw))
    }

    /// Plain text of an image via the vision model
    pub async fn extract_text_from_image(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: Option<&str>,
    ) -> Result<String, GenerationFailed> {
        self.router
            .extract_text_from_image(image, mime_type, prompt.unwrap_or(DEFAULT_OCR_PROMPT))
            .await
    }
}

fn describe_file(file: &UploadedFile) -> String {
    format!(
        "File name: {}\nMIME type: {}\nSize: {} bytes\n\n\
         The file content could not be read as text. Infer the likely subject and its \
         syllabus topics from the file name and type.",
        file.name,
        file.mime_type,
        file.size()
    )
}

/// At most `limit` characters of `text`, cut on a char boundary
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
