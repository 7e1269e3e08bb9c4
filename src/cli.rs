use anyhow::{bail, Result};
use dialoguer::Input;

use crate::model::board::Board;

const RULE: &str = "------------------------------";

/// List the boards and ask for one until a valid index is entered.
pub fn prompt_board(boards: &[Board]) -> Result<usize> {
    println!("{RULE}");
    print!("{}", board_menu(boards));
    println!("{RULE}");

    let count = boards.len();
    let answer: String = Input::new()
        .with_prompt("Select a board")
        .validate_with(|input: &String| -> Result<(), String> {
            parse_board_choice(input, count)
                .map(|_| ())
                .map_err(|_| "This is not a valid board number.".to_string())
        })
        .interact_text()?;

    parse_board_choice(&answer, count)
}

/// One `{index:4}: {name}` line per board.
pub fn board_menu(boards: &[Board]) -> String {
    boards
        .iter()
        .enumerate()
        .map(|(i, b)| format!("{i:4}: {}\n", b.name))
        .collect()
}

pub fn parse_board_choice(input: &str, count: usize) -> Result<usize> {
    let index: usize = match input.trim().parse() {
        Ok(index) => index,
        Err(_) => bail!("'{}' is not a number", input.trim()),
    };
    if index >= count {
        bail!("There is no board {index}");
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boards(names: &[&str]) -> Vec<Board> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| Board {
                id: format!("b{i}"),
                name: n.to_string(),
                desc: String::new(),
            })
            .collect()
    }

    #[test]
    fn parse_valid_choice() {
        assert_eq!(parse_board_choice("0", 3).unwrap(), 0);
        assert_eq!(parse_board_choice(" 2 \n", 3).unwrap(), 2);
    }

    #[test]
    fn parse_out_of_range_fails() {
        let err = parse_board_choice("3", 3).unwrap_err();
        assert!(err.to_string().contains("no board 3"));
    }

    #[test]
    fn parse_negative_or_garbage_fails() {
        assert!(parse_board_choice("-1", 3).is_err());
        assert!(parse_board_choice("two", 3).is_err());
        assert!(parse_board_choice("", 3).is_err());
    }

    #[test]
    fn menu_lists_boards_with_padded_indexes() {
        let menu = board_menu(&boards(&["Alpha", "Beta"]));
        assert_eq!(menu, "   0: Alpha\n   1: Beta\n");
    }

    #[test]
    fn menu_handles_unicode_names() {
        let menu = board_menu(&boards(&["Équipe 🚀"]));
        assert_eq!(menu, "   0: Équipe 🚀\n");
    }
}
