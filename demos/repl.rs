use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::panic;
use std::process;
use tracing_subscriber::EnvFilter;
use vauxp::Error;
use vauxp::ast::Value;
use vauxp::builtinops::{create_global_env, find_builtin_op};
use vauxp::evaluator::{self, Environment};
use vauxp::reader::parse_program;

fn main() {
    // RUST_LOG=vauxp=trace shows every combiner application
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let result = panic::catch_unwind(|| {
        run_repl();
    });

    if let Err(panic_info) = result {
        eprintln!("The REPL encountered an unexpected error and must exit.");

        if let Some(msg) = panic_info.downcast_ref::<&str>() {
            eprintln!("Error: {msg}");
        } else if let Some(msg) = panic_info.downcast_ref::<String>() {
            eprintln!("Error: {msg}");
        } else {
            eprintln!("Error: Unknown panic occurred");
        }

        process::exit(1);
    }
}

fn run_repl() {
    println!("VauXP - a minimal Kernel-style evaluator with first-class operatives");
    println!("Enter expressions like: ($define! quote ($vau (x) x))");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(err) => {
            eprintln!("Could not initialize REPL: {err}");
            process::exit(1);
        }
    };
    let env = create_global_env();

    // Callable from user code as well: (help)
    env.register_builtin_operation::<_, ()>("help", print_help);

    loop {
        match rl.readline("vau> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        _ = print_help().is_ok();
                        continue;
                    }
                    ":env" => {
                        print_environment(&env);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                // A line may hold several expressions; stop at the first error
                let result = parse_program(line).and_then(|program| {
                    let mut last = None;
                    for expr in &program {
                        last = Some(evaluator::eval(expr, &env)?);
                    }
                    Ok(last)
                });

                match result {
                    Ok(Some(value)) => println!("{value}"),
                    Ok(None) => {}
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() -> Result<Value, Error> {
    println!("Kernel-style vau evaluator:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Syntax:");
    println!("  Numbers: 42, -5, #xff");
    println!("  Strings: \"text\" (also lists of character codes)");
    println!("  Lists: (a b c), dotted (a . rest), empty ()");
    println!("  Comments: ; to end of line");
    println!();
    println!("Primitives:");
    println!("  Operatives: $define!, $vau");
    println!("  Applicatives: eval, wrap, unwrap, read, head, tail, =, <");
    println!("  Predicates: list?, operative?, applicative?, number?, symbol?");
    println!("  Booleans: #t/#f select one of two operands: ((< 1 2) yes no)");
    println!("  Environments: (current-world)");
    println!();
    println!("Examples:");
    println!("  ($define! quote ($vau (x) x))");
    println!("  ($define! list (wrap ($vau args args)))");
    println!("  (list 1 (head \"ab\") (quote (a b)))");
    println!("  (eval (read \"(tail \\\"xyz\\\")\"))");
    println!();

    Ok(Value::Nil)
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    if bindings.is_empty() {
        println!("Environment is empty.");
        return;
    }

    println!("Environment bindings ({} total):", bindings.len());
    println!();

    // Separate primitives from user-defined values
    let mut builtins = Vec::new();
    let mut user_defined = Vec::new();

    for (name, value) in bindings {
        if find_builtin_op(&name).is_some() || matches!(value, Value::NativeFunction { .. }) {
            builtins.push(name);
        } else {
            user_defined.push((name, value));
        }
    }

    if !builtins.is_empty() {
        println!("Primitives ({}):", builtins.len());
        let mut col = 0;
        for name in builtins {
            print!("  {name:<15}");
            col += 1;
            if col % 4 == 0 {
                println!();
            }
        }
        if col % 4 != 0 {
            println!();
        }
        println!();
    }

    if !user_defined.is_empty() {
        println!("User-defined values ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
