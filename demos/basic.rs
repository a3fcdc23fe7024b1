use netsift::*;

fn main() -> Result<()> {
    // 1. Define the field registry the dissector would supply
    let schema = Schema::builder()
        .field("tcp.port", ValueKind::UInt)
        .field("http.request.method", ValueKind::Str)
        .field("ip.addr", ValueKind::Ipv4)
        .build();

    // 2. Build the engine (stock functions, frozen namespace)
    let engine = FilterEngine::new(schema);

    // 3. Compile a display filter
    let filter_str = r#"http.request.method == "GET" && tcp.port in {80, 443}"#;
    let filter = engine.parse_and_compile(filter_str)?;
    println!("{}", filter.disassemble());

    // 4. Build a record the way dissection would
    let mut record = engine.new_record();
    record.set("http.request.method", FieldValue::Str("GET".into()))?;
    record.set("tcp.port", FieldValue::UInt(80))?;
    record.push("ip.addr", FieldValue::Ipv4("10.1.2.3".parse().unwrap()))?;

    // 5. Evaluate
    println!("filter matches: {}", filter.matches(&record));

    // Errors carry the span to highlight
    match engine.parse_and_compile("bogus.field == 1") {
        Ok(_) => unreachable!(),
        Err(e) => println!("rejected: {} (span {:?})", e, e.location()),
    }
    Ok(())
}
