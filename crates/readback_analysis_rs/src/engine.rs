//! The analysis pipeline: parser, context builder, pairer and error detector
//! wired together over a shared adaptive model.

use aviation_helper_rs::{
    KnowledgeBase,
    clearance::{
        instruction::InstructionType,
        phase::{CorpusType, FlightPhase},
    },
};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    callsign::CallsignMatcher,
    config::EngineConfig,
    context::{ContextBuilder, ConversationContext},
    detection::{
        DetectedError, ErrorDetector, correctness, overall_confidence, rollup_severity, suggestions,
    },
    dialogue::{DialogueParser, ParsedLine, Speaker},
    errors::Error,
    model::{
        history::{PredictedOutcome, UserCorrection},
        learning::{ReinforcementSession, WeightUpdate},
        stats::ModelStats,
        store::ModelHandle,
        weights::ModelWeights,
    },
    pairing::{ExchangePair, ExchangePairer, ReadbackEvaluator, ReadbackQuality},
    phraseology::Phraseology,
    severity::Severity,
};

/// One ATC instruction and the pilot's readback.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AnalysisRequest {
    pub atc: String,
    pub pilot: String,
    /// When set, the pilot has to use exactly this callsign.
    #[serde(default)]
    pub callsign: Option<String>,
    /// Error types from the student's earlier attempts.
    #[serde(default)]
    pub previous_errors: Vec<String>,
}

impl AnalysisRequest {
    pub fn new(atc: impl Into<String>, pilot: impl Into<String>) -> Self {
        Self {
            atc: atc.into(),
            pilot: pilot.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnalysisResult {
    pub is_correct: bool,
    pub confidence: f64,
    pub phase: FlightPhase,
    pub errors: Vec<DetectedError>,
    pub severity: Severity,
    pub suggestions: Vec<String>,
    /// `None` when the instruction needs no readback.
    pub instruction_type: Option<InstructionType>,
    pub readback_quality: Option<ReadbackQuality>,
    pub correctness: f64,
}

impl AnalysisResult {
    /// What the model predicted, in the form a user correction refers to.
    pub fn prediction(&self, request: &AnalysisRequest) -> PredictedOutcome {
        PredictedOutcome {
            atc: request.atc.clone(),
            pilot: request.pilot.clone(),
            predicted_correct: self.is_correct,
            predicted_errors: self.errors.iter().map(|e| e.kind.clone()).collect(),
            predicted_phase: self.phase,
        }
    }
}

/// Per-exchange detail of a dialogue analysis. The exchange itself is in
/// the context's `exchange_pairs` at the same index.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExchangeAnalysis {
    pub atc_line_number: usize,
    pub errors: Vec<DetectedError>,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DialogueAnalysis {
    pub corpus_type: CorpusType,
    pub lines: Vec<ParsedLine>,
    pub context: ConversationContext,
    pub exchanges: Vec<ExchangeAnalysis>,
    /// Share of complete readbacks, `None` without any instruction.
    pub readback_accuracy: Option<f64>,
    pub passed: bool,
    pub severity: Severity,
    pub suggestions: Vec<String>,
}

pub struct ReadbackEngine {
    parser: DialogueParser,
    context_builder: ContextBuilder,
    pairer: ExchangePairer,
    detector: ErrorDetector,
    model: ModelHandle,
}

impl ReadbackEngine {
    pub fn new(
        kb: &KnowledgeBase,
        config: EngineConfig,
        model: ModelHandle,
    ) -> Result<Self, Error> {
        let callsigns = CallsignMatcher::new(&kb.callsigns)?;
        let phraseology = Phraseology::compile(kb)?;
        let evaluator = ReadbackEvaluator::new(phraseology.clone(), callsigns.clone(), &config)?;
        Ok(Self {
            parser: DialogueParser::new(callsigns.clone(), &config)?,
            context_builder: ContextBuilder::new(kb, callsigns.clone(), &config)?,
            pairer: ExchangePairer::new(evaluator, &config)?,
            detector: ErrorDetector::new(phraseology, callsigns)?,
            model,
        })
    }

    /// The shared model this engine reads its weights from.
    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn classify_instruction(&self, atc: &str) -> InstructionType {
        self.pairer.classifier().classify(&self.parser.normalize(atc))
    }

    /// Analyzes a single instruction/readback exchange.
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, Error> {
        if request.atc.trim().is_empty() {
            return Err(Error::MissingInput("atc"));
        }
        if request.pilot.trim().is_empty() {
            return Err(Error::MissingInput("pilot"));
        }
        let weights = self.model.weights()?;
        let min_confidence = self.model.config()?.min_confidence;

        let lines = vec![
            ParsedLine::new(
                1,
                self.parser.normalize(&request.atc),
                request.atc.clone(),
                Speaker::Atc,
            ),
            ParsedLine::new(
                2,
                self.parser.normalize(&request.pilot),
                request.pilot.clone(),
                Speaker::Pilot,
            ),
        ];
        let mut context = self.context_builder.build_context(&lines);
        let phase =
            context.effective_phase(weights.thresholds.phase_confidence, FlightPhase::Unknown);
        context.flight_phase = phase;

        let pairs = self.pairer.pair(&lines, &mut context);
        let Some(exchange) = pairs.first() else {
            debug!("No readback required for {:?}", request.atc);
            return Ok(AnalysisResult {
                is_correct: true,
                confidence: overall_confidence(context.phase_confidence, 0.7, 1.0, &[]),
                phase,
                errors: Vec::new(),
                severity: Severity::Low,
                suggestions: Vec::new(),
                instruction_type: None,
                readback_quality: None,
                correctness: 1.0,
            });
        };

        let errors = self.errors_for(
            exchange,
            &weights,
            request.callsign.as_deref(),
            min_confidence,
        );
        let correctness = correctness(&errors);
        let result = AnalysisResult {
            is_correct: correctness >= weights.thresholds.error_detection,
            confidence: overall_confidence(
                context.phase_confidence,
                exchange.evaluation_confidence,
                weights.pattern_weight(exchange.instruction_type),
                &errors,
            ),
            phase,
            severity: rollup_severity(&errors, &weights, phase),
            suggestions: suggestions(
                &errors,
                &request.previous_errors,
                context.issue_accumulator.is_systematic(),
            ),
            instruction_type: Some(exchange.instruction_type),
            readback_quality: Some(exchange.readback_quality),
            correctness,
            errors,
        };
        debug!(
            "{} readback: {} errors, correctness {:.2}, severity {}",
            exchange.instruction_type,
            result.errors.len(),
            correctness,
            result.severity
        );
        Ok(result)
    }

    /// Analyzes a whole transcript of one corpus type.
    pub fn analyze_dialogue(
        &self,
        transcript: &str,
        corpus_type: CorpusType,
    ) -> Result<DialogueAnalysis, Error> {
        if transcript.trim().is_empty() {
            return Err(Error::MissingInput("transcript"));
        }
        let weights = self.model.weights()?;
        let min_confidence = self.model.config()?.min_confidence;

        let lines = self.parser.parse(transcript);
        let mut context = self.context_builder.build_context(&lines);
        context.flight_phase = context.effective_phase(
            weights.thresholds.phase_confidence,
            corpus_type.fallback_phase(),
        );

        let pairs = self.pairer.pair(&lines, &mut context);
        let mut exchanges = Vec::with_capacity(pairs.len());
        let mut all_errors = Vec::new();
        let mut severity = Severity::Low;
        for exchange in &pairs {
            let errors = self.errors_for(exchange, &weights, None, min_confidence);
            let exchange_severity = rollup_severity(&errors, &weights, context.flight_phase)
                .max(exchange.contextual_severity);
            severity = severity.max(exchange_severity);
            all_errors.extend(errors.iter().cloned());
            exchanges.push(ExchangeAnalysis {
                atc_line_number: exchange.atc_line.line_number,
                errors,
                severity: exchange_severity,
            });
        }

        let complete = pairs
            .iter()
            .filter(|p| p.readback_quality == ReadbackQuality::Complete)
            .count();
        let readback_accuracy = (!pairs.is_empty()).then(|| complete as f64 / pairs.len() as f64);
        let passed = readback_accuracy.is_none_or(|a| a >= weights.thresholds.readback_accuracy);
        let suggestions = suggestions(&all_errors, &[], context.issue_accumulator.is_systematic());
        context.exchange_pairs = pairs;

        info!(
            "Analyzed {corpus_type} dialogue: {} lines, {} exchanges, phase {}, {}",
            lines.len(),
            exchanges.len(),
            context.flight_phase,
            if passed { "passed" } else { "failed" }
        );
        Ok(DialogueAnalysis {
            corpus_type,
            lines,
            context,
            exchanges,
            readback_accuracy,
            passed,
            severity,
            suggestions,
        })
    }

    fn errors_for(
        &self,
        exchange: &ExchangePair,
        weights: &ModelWeights,
        callsign: Option<&str>,
        min_confidence: f64,
    ) -> Vec<DetectedError> {
        self.detector
            .detect_errors(exchange, weights, callsign)
            .into_iter()
            .filter(|e| e.confidence >= min_confidence)
            .collect()
    }

    /// Folds a user correction into the model.
    pub fn apply_correction(&self, correction: UserCorrection) -> Result<Vec<WeightUpdate>, Error> {
        if correction.original.atc.trim().is_empty() {
            return Err(Error::MissingInput("atc"));
        }
        let instruction = Some(self.classify_instruction(&correction.original.atc))
            .filter(|i| *i != InstructionType::Unknown);
        self.model.apply_correction(correction, instruction)
    }

    pub fn reinforce(&self, session: &ReinforcementSession) -> Result<Vec<WeightUpdate>, Error> {
        self.model.reinforce(session)
    }

    pub fn stats(&self) -> Result<ModelStats, Error> {
        self.model.stats()
    }

    pub fn reset(&self) -> Result<(), Error> {
        self.model.reset()
    }
}
