//! The interactive shell: prompt, line parsing and command dispatch.
//!
//! The shell consumes only the public [`FileSystem`] API; every tokenised
//! argument reaches the core pre-dequoted.

use crate::errors::{FsError, Result};
use crate::fs::{FileSystem, DEFAULT_BLOCK_SIZE, DEFAULT_IMAGE_SIZE};
use crate::mkfs::mkfs;
use std::io::{self, BufRead, Write};

pub struct Shell {
    fs: FileSystem,
    image_path: String,
}

impl Shell {
    /// Open `image_path` and run the shell; offers to format a fresh image
    /// when the file cannot be mounted.
    pub fn start(image_path: &str) -> anyhow::Result<()> {
        let fs = match FileSystem::open(image_path) {
            Ok(fs) => fs,
            Err(err) => {
                println!("Could not open filesystem image {image_path}: {err}");
                if !ask_yes_no("Format a new filesystem (all data will be lost)? (y/n): ")? {
                    return Ok(());
                }
                mkfs(image_path, DEFAULT_IMAGE_SIZE, DEFAULT_BLOCK_SIZE)?
            }
        };

        Shell {
            fs,
            image_path: image_path.to_string(),
        }
        .run()
    }

    fn run(mut self) -> anyhow::Result<()> {
        let stdin = io::stdin();
        let mut line = String::new();

        loop {
            print!(
                "{}@imagefs:{}$ ",
                self.fs.current_user_name(),
                self.fs.current_path()
            );
            io::stdout().flush()?;

            line.clear();
            if stdin.lock().read_line(&mut line)? == 0 {
                break;
            }
            let parts = tokenize(line.trim());
            if parts.is_empty() {
                continue;
            }

            match parts[0].as_str() {
                "exit" => {
                    println!("File system closed.");
                    break;
                }
                "format" => {
                    if ask_yes_no(
                        "Are you sure you want to format the filesystem (all data will be lost)? (y/n): ",
                    )? {
                        self.fs = mkfs(&self.image_path, DEFAULT_IMAGE_SIZE, DEFAULT_BLOCK_SIZE)?;
                        println!("File system formatted.");
                    }
                }
                command => {
                    if let Err(err) = self.execute(command, &parts[1..]) {
                        println!("Error: {err}");
                    }
                }
            }
        }

        self.fs.flush()?;
        Ok(())
    }

    fn execute(&mut self, command: &str, args: &[String]) -> Result<()> {
        match command {
            "create" => {
                check_arity(command, args, 1, 2)?;
                let name = &args[0];
                if name.ends_with('.') {
                    return Err(FsError::IncorrectFileName(name.clone()));
                }
                if let Some(dir_name) = name.strip_suffix('/') {
                    return self.fs.create_directory(dir_name);
                }
                match args.get(1) {
                    Some(content) => self.fs.create_file(name, content),
                    None => self.fs.create_empty_file(name),
                }
            }
            "edit" => {
                check_arity(command, args, 2, 2)?;
                self.fs.edit_file(&args[0], &args[1])
            }
            "append" => {
                check_arity(command, args, 2, 2)?;
                self.fs.append_to_file(&args[0], &args[1])
            }
            "read" => {
                check_arity(command, args, 1, 1)?;
                let content = self.fs.read_file(&args[0])?;
                println!("{content}");
                Ok(())
            }
            "delete" => {
                check_arity(command, args, 1, 1)?;
                self.fs.delete(&args[0])
            }
            "list" => {
                check_arity(command, args, 0, 1)?;
                let lines = match args.first().map(String::as_str) {
                    None => self.fs.list()?,
                    Some("-l") => self.fs.list_long()?,
                    Some(other) => {
                        return Err(FsError::UnknownArguments(other.to_string()));
                    }
                };
                for line in lines {
                    println!("{line}");
                }
                Ok(())
            }
            "cd" => {
                check_arity(command, args, 1, 1)?;
                self.fs.change_directory(&args[0])
            }
            "move" => {
                check_arity(command, args, 2, 2)?;
                self.fs.move_entry(&args[0], &args[1])
            }
            "copy" => {
                check_arity(command, args, 2, 2)?;
                self.fs.copy_entry(&args[0], &args[1])
            }
            "changeuser" => {
                check_arity(command, args, 2, 2)?;
                self.fs.change_user(&args[0], &args[1])
            }
            "adduser" => {
                check_arity(command, args, 2, 2)?;
                self.fs.add_user(&args[0], &args[1])
            }
            "deleteuser" => {
                check_arity(command, args, 1, 1)?;
                self.fs.delete_user(&args[0])
            }
            "chmod" => {
                check_arity(command, args, 2, 2)?;
                let value = args[1]
                    .parse::<u32>()
                    .map_err(|_| FsError::IllegalArgument(args[1].clone()))?;
                self.fs.change_permissions(&args[0], value)
            }
            "help" => {
                print_help();
                Ok(())
            }
            unknown => Err(FsError::UnknownCommand(unknown.to_string())),
        }
    }
}

fn check_arity(command: &str, args: &[String], min: usize, max: usize) -> Result<()> {
    if args.len() < min {
        return Err(FsError::MissingArguments(command.to_string()));
    }
    if args.len() > max {
        return Err(FsError::UnknownArguments(args[max..].join(" ")));
    }
    Ok(())
}

/// Split a command line into tokens, honouring single/double quotes and
/// backslash escapes.
fn tokenize(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escape = false;

    for ch in line.chars() {
        if escape {
            current.push(ch);
            escape = false;
            continue;
        }
        match quote {
            Some(closing) if ch == closing => {
                args.push(std::mem::take(&mut current));
                quote = None;
            }
            Some(_) => current.push(ch),
            None => match ch {
                '\\' => escape = true,
                '"' | '\'' => quote = Some(ch),
                other if other.is_whitespace() => {
                    if !current.is_empty() {
                        args.push(std::mem::take(&mut current));
                    }
                }
                other => current.push(other),
            },
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

fn ask_yes_no(prompt: &str) -> io::Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn print_help() {
    println!();
    println!("Available commands:");
    println!();
    println!("format - format the filesystem (all data will be lost)");
    println!("create <name>[/] [content] - create a file, or a directory when the name ends with /");
    println!("edit <path> <content> - replace the content of a file");
    println!("append <path> <content> - append content to the end of a file");
    println!("move <from> <to> - move a file or directory");
    println!("copy <from> <to> - copy a file or directory");
    println!("read <path> - print the content of a file");
    println!("delete <path> - delete a file or directory");
    println!("list [-l] - list the current directory (-l for the long form)");
    println!("cd <path> - change the current directory");
    println!("changeuser <name> <password> - switch to another user");
    println!("adduser <name> <password> - add a new user");
    println!("deleteuser <name> - delete a user (root only)");
    println!("chmod <path> <value> - change the permissions of a file or directory");
    println!("exit - close the filesystem and leave");
    println!();
}
