//! Utilities for terminal output during scanning.

/// Prints a red `[!]` warning line.
///
/// The three-argument form prints nothing in greppable mode and drops the
/// prefix in accessible mode; `detail!` and `output!` behave the same.
#[macro_export]
macro_rules! warning {
    ($name:expr) => {
        println!("{} {}", colored::Colorize::bold(colored::Colorize::red("[!]")), $name)
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        // if not greppable then print, otherwise no else statement so do not print.
        if !$greppable {
            if $accessible {
                // Don't print the ascii art
                println!("{}", $name);
            } else {
                println!("{} {}", colored::Colorize::bold(colored::Colorize::red("[!]")), $name);
            }
        }
    };
}

/// Prints a blue `[~]` informational line.
#[macro_export]
macro_rules! detail {
    ($name:expr) => {
        println!("{} {}", colored::Colorize::bold(colored::Colorize::blue("[~]")), $name)
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!("{} {}", colored::Colorize::bold(colored::Colorize::blue("[~]")), $name);
            }
        }
    };
}

/// Prints a green `[>]` result line.
#[macro_export]
macro_rules! output {
    ($name:expr) => {
        println!("{} {}", colored::Colorize::bold(colored::Colorize::green("[>]")), $name)
    };
    ($name:expr, $greppable:expr, $accessible:expr) => {
        if !$greppable {
            if $accessible {
                println!("{}", $name);
            } else {
                println!("{} {}", colored::Colorize::bold(colored::Colorize::green("[>]")), $name);
            }
        }
    };
}

/// Prints the opening banner unless the run is greppable or accessible.
pub fn print_opening(greppable: bool, accessible: bool) {
    use colored::Colorize;

    if greppable || accessible {
        return;
    }

    let banner = r"
 ┏━┓┏━╸┏━┓┏━╸╻ ╻┏━╸┏━┓┏━╸┏━┓┏┓╻
 ┣┳┛┣╸ ┗━┓┃  ┃ ┃┣╸ ┗━┓┃  ┣━┫┃┗┫
 ╹┗╸┗━╸┗━┛┗━╸┗━┛┗━╸┗━┛┗━╸╹ ╹╹ ╹";
    println!("{}", banner.bold().cyan());
    println!("{}", "ping first, knock on ports for the rest".italic().dimmed());
    println!();
}
