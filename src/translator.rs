/// Target dialect of the host command interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellKind {
    Posix,
    PowerShell,
}

impl ShellKind {
    pub fn host() -> Self {
        if cfg!(windows) {
            ShellKind::PowerShell
        } else {
            ShellKind::Posix
        }
    }

    /// Interpreter binary and its "run this string" flag. The full command
    /// is always passed as a single argument after this flag.
    pub fn interpreter(self) -> (&'static str, &'static str) {
        match self {
            ShellKind::Posix => ("sh", "-c"),
            ShellKind::PowerShell => ("powershell.exe", "-Command"),
        }
    }
}

/// Portable command names the translator recognizes. First-token
/// membership is case-sensitive; everything else passes through unchanged.
const PORTABLE_COMMANDS: &[&str] = &[
    "ls", "pwd", "cat", "head", "tail", "touch", "mkdir", "rm", "cp", "mv", "echo", "clear", "ps",
    "kill", "grep", "find", "df", "whoami", "hostname", "date", "wc",
];

/// Per-(command, flag) substitutions for PowerShell. Flags without an entry
/// pass through verbatim, even if the result is not valid PowerShell; that
/// surfaces as a normal failed execution, not a translator error.
const FLAG_SUBSTITUTIONS: &[(&str, &str, &str)] = &[
    ("ls", "-la", "-Force"),
    ("ls", "-al", "-Force"),
    ("ls", "-a", "-Force"),
    ("ls", "-l", ""), // long listing is the Get-ChildItem default
    ("rm", "-rf", "-Recurse -Force"),
    ("rm", "-fr", "-Recurse -Force"),
    ("rm", "-r", "-Recurse"),
    ("rm", "-f", "-Force"),
    ("cp", "-r", "-Recurse"),
    ("mkdir", "-p", ""), // New-Item -Force already creates parents
];

/// Rewrites portable (Unix-style) command strings into the host dialect.
/// Pure: no side effects, output depends only on the input and the tables.
pub struct Translator {
    shell: ShellKind,
}

impl Translator {
    pub fn new(shell: ShellKind) -> Self {
        Self { shell }
    }

    pub fn is_portable_command(&self, command: &str) -> bool {
        match command.split_whitespace().next() {
            Some(first) => PORTABLE_COMMANDS.contains(&first),
            None => false,
        }
    }

    pub fn translate(&self, command: &str) -> String {
        // Portable commands already are native syntax on a POSIX host.
        if self.shell == ShellKind::Posix {
            return command.to_string();
        }

        let tokens: Vec<&str> = command.split_whitespace().collect();
        let Some((&name, rest)) = tokens.split_first() else {
            return command.to_string();
        };
        if !PORTABLE_COMMANDS.contains(&name) {
            return command.to_string();
        }

        let mut flags = Vec::new();
        let mut args = Vec::new();
        for &token in rest {
            if token.starts_with('-') {
                match lookup_flag(name, token) {
                    Some("") => {}
                    Some(native) => flags.push(native.to_string()),
                    None => flags.push(token.to_string()),
                }
            } else {
                args.push(token);
            }
        }

        self.render(name, &flags, &args)
    }

    fn render(&self, name: &str, flags: &[String], args: &[&str]) -> String {
        match name {
            "ls" => join_parts("Get-ChildItem", flags, &quote_all(args)),
            "pwd" => "Get-Location".to_string(),
            "cat" => unary("Get-Content", args, "cat: missing file name"),
            "head" => piped_unary(args, "Select-Object -First 10", "head: missing file name"),
            "tail" => piped_unary(args, "Select-Object -Last 10", "tail: missing file name"),
            "touch" => match args.first() {
                Some(file) => format!(
                    "if (Test-Path \"{file}\") {{ (Get-Item \"{file}\").LastWriteTime = Get-Date }} else {{ New-Item -ItemType File \"{file}\" | Out-Null }}"
                ),
                None => missing("touch: missing file name"),
            },
            "mkdir" => match args.first() {
                Some(dir) => join_parts(
                    &format!("New-Item -ItemType Directory \"{dir}\" -Force"),
                    flags,
                    &[],
                ),
                None => missing("mkdir: missing directory name"),
            },
            "rm" => match args.first() {
                Some(file) => {
                    let switches = if flags.is_empty() {
                        "-Force".to_string()
                    } else {
                        flags.join(" ")
                    };
                    format!("Remove-Item \"{file}\" {switches}")
                }
                None => missing("rm: missing file name"),
            },
            "cp" => binary("Copy-Item", flags, args, "cp: need source and destination"),
            "mv" => binary("Move-Item", flags, args, "mv: need source and destination"),
            "echo" => {
                if args.is_empty() && flags.is_empty() {
                    "Write-Output \"\"".to_string()
                } else {
                    join_parts("Write-Output", flags, &args.iter().map(|a| a.to_string()).collect::<Vec<_>>())
                }
            }
            "clear" => "Clear-Host".to_string(),
            "ps" => "Get-Process | Select-Object ProcessName,Id,CPU".to_string(),
            "kill" => match args.first() {
                Some(pid) => format!("Stop-Process -Id {pid} -Force"),
                None => missing("kill: missing process ID"),
            },
            "grep" => {
                if args.is_empty() && flags.is_empty() {
                    missing("grep: missing search pattern")
                } else {
                    join_parts("Select-String", flags, &args.iter().map(|a| a.to_string()).collect::<Vec<_>>())
                }
            }
            "find" => {
                let path = args.first().copied().unwrap_or(".");
                format!("Get-ChildItem -Path \"{path}\" -Recurse")
            }
            "df" => "Get-PSDrive -PSProvider FileSystem".to_string(),
            "whoami" => "$env:USERNAME".to_string(),
            "hostname" => "$env:COMPUTERNAME".to_string(),
            "date" => "Get-Date".to_string(),
            "wc" => match args.first() {
                Some(file) => {
                    format!("Get-Content \"{file}\" | Measure-Object -Line -Word -Character")
                }
                None => missing("wc: missing file name"),
            },
            // Membership was checked above; anything else passes through.
            other => {
                let mut parts = vec![other.to_string()];
                parts.extend(flags.iter().cloned());
                parts.extend(args.iter().map(|a| a.to_string()));
                parts.join(" ")
            }
        }
    }
}

fn lookup_flag(command: &str, flag: &str) -> Option<&'static str> {
    FLAG_SUBSTITUTIONS
        .iter()
        .find(|(cmd, portable, _)| *cmd == command && *portable == flag)
        .map(|(_, _, native)| *native)
}

fn quote_all(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| format!("\"{a}\"")).collect()
}

fn join_parts(base: &str, flags: &[String], args: &[String]) -> String {
    let mut parts = vec![base.to_string()];
    parts.extend(flags.iter().cloned());
    parts.extend(args.iter().cloned());
    parts.join(" ")
}

fn unary(base: &str, args: &[&str], missing_msg: &str) -> String {
    match args.first() {
        Some(arg) => format!("{base} \"{arg}\""),
        None => missing(missing_msg),
    }
}

fn piped_unary(args: &[&str], stage: &str, missing_msg: &str) -> String {
    // head/tail take the file as their last argument
    match args.last() {
        Some(file) => format!("Get-Content \"{file}\" | {stage}"),
        None => missing(missing_msg),
    }
}

fn binary(base: &str, flags: &[String], args: &[&str], missing_msg: &str) -> String {
    if args.len() < 2 {
        return missing(missing_msg);
    }
    let mut parts = vec![
        base.to_string(),
        format!("\"{}\"", args[0]),
        format!("\"{}\"", args[1]),
    ];
    parts.extend(flags.iter().cloned());
    parts.join(" ")
}

fn missing(msg: &str) -> String {
    format!("Write-Host \"{msg}\"")
}
