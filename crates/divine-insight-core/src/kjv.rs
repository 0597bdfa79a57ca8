//! Built-in King James Version sample text.

use crate::scripture::{Book, Chapter, Verse};

fn chapter(book: &str, number: u32, verses: &[(u32, &str)]) -> Chapter {
    Chapter {
        chapter_number: number,
        verses: verses
            .iter()
            .map(|(verse, text)| Verse {
                book_name: book.to_string(),
                chapter: number,
                verse: *verse,
                text: text.to_string(),
            })
            .collect(),
    }
}

pub(crate) fn books() -> Vec<Book> {
    vec![
        Book {
            name: "Genesis".to_string(),
            abbreviation: "Gen".to_string(),
            chapters: vec![
                chapter("Genesis", 1, &[
                    (1, "In the beginning God created the heaven and the earth."),
                    (2, "And the earth was without form, and void; and darkness was upon the face of the deep. And the Spirit of God moved upon the face of the waters."),
                    (3, "And God said, Let there be light: and there was light."),
                    (4, "And God saw the light, that it was good: and God divided the light from the darkness."),
                    (5, "And God called the light Day, and the darkness he called Night. And the evening and the morning were the first day."),
                    (6, "And God said, Let there be a firmament in the midst of the waters, and let it divide the waters from the waters."),
                    (7, "And God made the firmament, and divided the waters which were under the firmament from the waters which were above the firmament: and it was so."),
                    (8, "And God called the firmament Heaven. And the evening and the morning were the second day."),
                    (9, "And God said, Let the waters under the heaven be gathered together unto one place, and let the dry land appear: and it was so."),
                    (10, "And God called the dry land Earth; and the gathering together of the waters called he Seas: and God saw that it was good."),
                ]),
                chapter("Genesis", 2, &[
                    (1, "Thus the heavens and the earth were finished, and all the host of them."),
                    (2, "And on the seventh day God ended his work which he had made; and he rested on the seventh day from all his work which he had made."),
                    (3, "And God blessed the seventh day, and sanctified it: because that in it he had rested from all his work which God created and made."),
                ]),
            ],
        },
        Book {
            name: "Exodus".to_string(),
            abbreviation: "Exo".to_string(),
            chapters: vec![chapter("Exodus", 1, &[
                (1, "Now these are the names of the children of Israel, which came into Egypt; every man and his household came with Jacob."),
                (2, "Reuben, Simeon, Levi, and Judah,"),
            ])],
        },
        Book {
            name: "John".to_string(),
            abbreviation: "Joh".to_string(),
            chapters: vec![chapter("John", 1, &[
                (1, "In the beginning was the Word, and the Word was with God, and the Word was God."),
                (2, "The same was in the beginning with God."),
                (3, "All things were made by him; and without him was not any thing made that was made."),
                (14, "And the Word was made flesh, and dwelt among us, (and we beheld his glory, the glory as of the only begotten of the Father,) full of grace and truth."),
            ])],
        },
    ]
}
