use readback_analysis_rs::{
    AnalysisRequest, CorpusType, EngineConfig, KnowledgeBase, ModelHandle, ReadbackEngine,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let engine = ReadbackEngine::new(
        &KnowledgeBase::builtin(),
        EngineConfig::default(),
        ModelHandle::default(),
    )?;

    // Single exchanges
    let exchanges = vec![
        (
            "PAL456, descend and maintain flight level 250",
            "Descend and maintain flight level 150, PAL456",
        ),
        ("CEB789, climb and maintain flight level 350", "Roger, CEB789"),
        ("PAL456, turn right heading 090", "Left heading 090"),
        ("PAL456, squawk 2461", "Squawk 2416, PAL456"),
        (
            "Philippine 123, cleared to land runway 24",
            "Cleared to land runway 24, Philippine 123",
        ),
    ];

    println!("Analyzing single exchanges:\n");
    for (atc, pilot) in exchanges {
        println!("ATC:   \"{}\"", atc);
        println!("PILOT: \"{}\"", pilot);
        let result = engine.analyze(&AnalysisRequest::new(atc, pilot))?;
        println!(
            "  {} ({:?}, severity {}, confidence {:.2})",
            if result.is_correct { "✓ correct" } else { "✗ incorrect" },
            result.readback_quality,
            result.severity,
            result.confidence
        );
        for error in &result.errors {
            println!("    {}: {}", error.kind, error.description);
        }
        for suggestion in &result.suggestions {
            println!("    → {}", suggestion);
        }
        println!();
    }

    // A continuous transcript without speaker labels
    let transcript = "\u{201C}PAL456, taxi to holding point runway 06 via alpha\u{201D} \
        \u{201C}Taxi holding point runway 06 via alpha, PAL456\u{201D} \
        \u{201C}PAL456, hold short runway 06\u{201D} \
        \u{201C}Roger, PAL456\u{201D}";

    println!("Analyzing dialogue:\n");
    let analysis = engine.analyze_dialogue(transcript, CorpusType::Ground)?;
    for line in &analysis.lines {
        println!("  {:>2} {:?}: {}", line.line_number, line.speaker, line.text);
    }
    println!(
        "\n  Phase: {}, primary callsign: {:?}",
        analysis.context.flight_phase, analysis.context.primary_callsign
    );
    for pair in &analysis.context.exchange_pairs {
        println!(
            "  Line {}: {} readback of {} ({})",
            pair.atc_line.line_number,
            pair.readback_quality,
            pair.instruction_type,
            pair.contextual_severity
        );
    }
    println!(
        "  Readback accuracy: {:?}, {}",
        analysis.readback_accuracy,
        if analysis.passed { "passed" } else { "failed" }
    );

    Ok(())
}
