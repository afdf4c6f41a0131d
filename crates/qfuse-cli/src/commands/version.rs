//! Version command implementation.

use console::style;

/// Execute the version command.
pub fn execute() {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - gate fusion and kernel generation for statevector simulation",
        style("qfuse").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    println!("Components:");
    println!("  qfuse-ir              Gates, symbolic matrices and the circuit graph");
    println!("  qfuse-compile         Fusion engine and kernel spec generation");
    println!("  qfuse-adapter-interp  Reference interpreter backend");
    println!("  qfuse-cli             Command-line interface");
    println!();
    println!("License:    {}", style("Apache-2.0").dim());
}
